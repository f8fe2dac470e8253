//! Recurrence rule model stored on original event records.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    const fn rrule_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Daily => Some("DAILY"),
            Self::Weekly => Some("WEEKLY"),
            Self::Monthly => Some("MONTHLY"),
            Self::Yearly => Some("YEARLY"),
        }
    }
}

/// Day selection for monthly and yearly rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPattern {
    /// Fixed day of month (1..=31, negative counts from the end).
    DayOfMonth(i8),
    /// Nth weekday of the month, e.g. second Tuesday; negative counts from the end.
    NthWeekday { nth: i8, weekday: Weekday },
}

/// How a recurrence range ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Until {
    #[default]
    Forever,
    Count(u32),
    /// Last day (inclusive) an occurrence may start on.
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub by_weekday: Vec<Weekday>,
    /// For yearly rules the month is taken from the series start.
    #[serde(default)]
    pub monthly: Option<MonthlyPattern>,
    #[serde(default)]
    pub until: Until,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::none()
    }
}

impl RecurrenceRule {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            frequency: Frequency::None,
            interval: 1,
            by_weekday: Vec::new(),
            monthly: None,
            until: Until::Forever,
        }
    }

    #[must_use]
    pub fn daily(interval: u32) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval,
            ..Self::none()
        }
    }

    #[must_use]
    pub fn weekly(interval: u32, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval,
            by_weekday: days.into_iter().collect(),
            ..Self::none()
        }
    }

    #[must_use]
    pub fn monthly(interval: u32, pattern: MonthlyPattern) -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval,
            monthly: Some(pattern),
            ..Self::none()
        }
    }

    #[must_use]
    pub fn yearly(interval: u32) -> Self {
        Self {
            frequency: Frequency::Yearly,
            interval,
            ..Self::none()
        }
    }

    #[must_use]
    pub const fn with_until(mut self, until: Until) -> Self {
        self.until = until;
        self
    }

    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        !matches!(self.frequency, Frequency::None)
    }

    /// ## Summary
    /// Renders the RFC 5545 RRULE body for this rule.
    ///
    /// `until_suffix` renders the UNTIL value for the series start type
    /// (the caller knows whether the series is all-day or timed).
    ///
    /// ## Errors
    /// Returns [`CoreError::ValidationError`] for a non-recurring rule or a
    /// zero interval.
    pub fn to_rrule_string(
        &self,
        week_start: Weekday,
        start_month: u32,
        until_suffix: impl Fn(NaiveDate) -> String,
    ) -> CoreResult<String> {
        let Some(freq) = self.frequency.rrule_name() else {
            return Err(CoreError::ValidationError(
                "rule has no recurrence frequency".to_string(),
            ));
        };
        if self.interval == 0 {
            return Err(CoreError::ValidationError(
                "recurrence interval must be positive".to_string(),
            ));
        }

        let mut parts = vec![format!("FREQ={freq}"), format!("INTERVAL={}", self.interval)];

        if self.frequency == Frequency::Weekly && !self.by_weekday.is_empty() {
            let days: Vec<&str> = self.by_weekday.iter().map(|day| weekday_code(*day)).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }

        if matches!(self.frequency, Frequency::Monthly | Frequency::Yearly) {
            if self.frequency == Frequency::Yearly && self.monthly.is_some() {
                parts.push(format!("BYMONTH={start_month}"));
            }
            match self.monthly {
                Some(MonthlyPattern::DayOfMonth(day)) => parts.push(format!("BYMONTHDAY={day}")),
                Some(MonthlyPattern::NthWeekday { nth, weekday }) => {
                    parts.push(format!("BYDAY={nth}{}", weekday_code(weekday)));
                }
                None => {}
            }
        }

        parts.push(format!("WKST={}", weekday_code(week_start)));

        match self.until {
            Until::Forever => {}
            Until::Count(count) => parts.push(format!("COUNT={count}")),
            Until::Date(date) => parts.push(format!("UNTIL={}", until_suffix(date))),
        }

        Ok(parts.join(";"))
    }
}

const fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn until_end_of_day(date: NaiveDate) -> String {
        format!("{}T235959Z", date.format("%Y%m%d"))
    }

    #[test]
    fn test_weekly_rule_string() {
        let rule = RecurrenceRule::weekly(1, [Weekday::Mon, Weekday::Wed]);
        assert_eq!(
            rule.to_rrule_string(Weekday::Mon, 1, until_end_of_day).unwrap(),
            "FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE;WKST=MO"
        );
    }

    #[test]
    fn test_until_and_count() {
        let until = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let rule = RecurrenceRule::daily(2).with_until(Until::Date(until));
        assert_eq!(
            rule.to_rrule_string(Weekday::Sun, 1, until_end_of_day).unwrap(),
            "FREQ=DAILY;INTERVAL=2;WKST=SU;UNTIL=20240114T235959Z"
        );

        let counted = RecurrenceRule::daily(1).with_until(Until::Count(3));
        assert!(
            counted
                .to_rrule_string(Weekday::Mon, 1, until_end_of_day)
                .unwrap()
                .ends_with("COUNT=3")
        );
    }

    #[test]
    fn test_monthly_nth_weekday() {
        let rule = RecurrenceRule::monthly(
            1,
            MonthlyPattern::NthWeekday {
                nth: 2,
                weekday: Weekday::Tue,
            },
        );
        assert_eq!(
            rule.to_rrule_string(Weekday::Mon, 1, until_end_of_day).unwrap(),
            "FREQ=MONTHLY;INTERVAL=1;BYDAY=2TU;WKST=MO"
        );
    }

    #[test]
    fn test_yearly_pattern_pins_month() {
        let mut rule = RecurrenceRule::yearly(1);
        rule.monthly = Some(MonthlyPattern::DayOfMonth(15));
        assert_eq!(
            rule.to_rrule_string(Weekday::Mon, 3, until_end_of_day).unwrap(),
            "FREQ=YEARLY;INTERVAL=1;BYMONTH=3;BYMONTHDAY=15;WKST=MO"
        );
    }

    #[test]
    fn test_non_recurring_rule_is_rejected() {
        assert!(
            RecurrenceRule::none()
                .to_rrule_string(Weekday::Mon, 1, until_end_of_day)
                .is_err()
        );
    }
}
