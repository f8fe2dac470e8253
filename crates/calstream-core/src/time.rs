//! Typed calendar time values and exception keys.
//!
//! Two time representations exist side by side: floating whole dates for
//! all-day events and absolute instants for timed events. Day-level
//! arithmetic for instants always goes through the environment timezone.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::EXDATE_SEPARATOR;
use crate::error::{CoreError, CoreResult};
use crate::types::Category;

const DATE_KEY_FORMAT: &str = "%Y%m%d";
const DATETIME_KEY_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A start or end value of a calendar record.
///
/// Values of different kinds order all-day first; use [`TimeValue::compare`]
/// when a timezone-aware comparison across kinds is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeValue {
    /// Floating whole date (all-day).
    Date(NaiveDate),
    /// Absolute instant (timed).
    Utc(DateTime<Utc>),
}

impl TimeValue {
    #[must_use]
    pub const fn is_all_day(self) -> bool {
        matches!(self, Self::Date(_))
    }

    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::Date(_) => Category::AllDay,
            Self::Utc(_) => Category::Timed,
        }
    }

    /// Returns true when both values use the same representation.
    #[must_use]
    pub const fn same_kind(self, other: Self) -> bool {
        self.is_all_day() == other.is_all_day()
    }

    /// Calendar date this value falls on in `tz`.
    #[must_use]
    pub fn local_date(self, tz: Tz) -> NaiveDate {
        match self {
            Self::Date(date) => date,
            Self::Utc(instant) => instant.with_timezone(&tz).date_naive(),
        }
    }

    /// Absolute instant of this value; dates map to their local day start.
    #[must_use]
    pub fn to_utc(self, tz: Tz) -> DateTime<Utc> {
        match self {
            Self::Date(date) => day_start(date, tz),
            Self::Utc(instant) => instant,
        }
    }

    /// Returns true for a timed value sitting exactly on local midnight.
    #[must_use]
    pub fn is_local_midnight(self, tz: Tz) -> bool {
        match self {
            Self::Date(_) => false,
            Self::Utc(instant) => {
                let local = instant.with_timezone(&tz);
                local.hour() == 0 && local.minute() == 0 && local.second() == 0
            }
        }
    }

    /// Compares two values, converting across kinds through `tz`.
    #[must_use]
    pub fn compare(self, other: Self, tz: Tz) -> Ordering {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) => a.cmp(&b),
            (Self::Utc(a), Self::Utc(b)) => a.cmp(&b),
            _ => self.to_utc(tz).cmp(&other.to_utc(tz)),
        }
    }

    /// Shifts the value; dates only move by whole days of `delta`.
    #[must_use]
    pub fn shifted(self, delta: TimeDelta) -> Self {
        match self {
            Self::Date(date) => Self::Date(
                date.checked_add_signed(TimeDelta::days(delta.num_days()))
                    .unwrap_or(date),
            ),
            Self::Utc(instant) => Self::Utc(instant.checked_add_signed(delta).unwrap_or(instant)),
        }
    }

    /// Signed distance from `earlier` to `self`.
    #[must_use]
    pub fn since(self, earlier: Self, tz: Tz) -> TimeDelta {
        match (self, earlier) {
            (Self::Date(a), Self::Date(b)) => a.signed_duration_since(b),
            _ => self.to_utc(tz).signed_duration_since(earlier.to_utc(tz)),
        }
    }
}

impl std::fmt::Display for TimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{date}"),
            Self::Utc(instant) => write!(f, "{}", instant.to_rfc3339()),
        }
    }
}

/// ## Summary
/// Returns the instant at which `date` starts in `tz`.
///
/// Falls back to UTC midnight when the local midnight does not exist.
#[must_use]
pub fn day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
}

/// Canonical encoding of an occurrence's original start.
///
/// Renders as `YYYYMMDD` for all-day occurrences and `YYYYMMDDTHHMMSSZ`
/// for timed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExceptionKey(TimeValue);

impl ExceptionKey {
    #[must_use]
    pub const fn new(start: TimeValue) -> Self {
        Self(start)
    }

    #[must_use]
    pub const fn time(self) -> TimeValue {
        self.0
    }

    /// Returns true when the keyed occurrence started strictly before `cutoff`.
    #[must_use]
    pub fn is_before(self, cutoff: TimeValue, tz: Tz) -> bool {
        self.0.compare(cutoff, tz) == Ordering::Less
    }
}

impl std::fmt::Display for ExceptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            TimeValue::Date(date) => write!(f, "{}", date.format(DATE_KEY_FORMAT)),
            TimeValue::Utc(instant) => write!(f, "{}Z", instant.format(DATETIME_KEY_FORMAT)),
        }
    }
}

impl FromStr for ExceptionKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.len() == 8 {
            return NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT)
                .map(|date| Self(TimeValue::Date(date)))
                .map_err(|err| CoreError::ParseError(format!("exception key {raw:?}: {err}")));
        }

        let body = raw.strip_suffix('Z').unwrap_or(raw);
        NaiveDateTime::parse_from_str(body, DATETIME_KEY_FORMAT)
            .map(|naive| Self(TimeValue::Utc(naive.and_utc())))
            .map_err(|err| CoreError::ParseError(format!("exception key {raw:?}: {err}")))
    }
}

impl TryFrom<String> for ExceptionKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExceptionKey> for String {
    fn from(key: ExceptionKey) -> Self {
        key.to_string()
    }
}

/// Sorted set of suppressed occurrences of a recurring event.
///
/// Serialized as a comma-joined list of [`ExceptionKey`]s on the original
/// event record; all in-memory logic works on the typed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionDateSet(BTreeSet<ExceptionKey>);

impl ExceptionDateSet {
    /// ## Summary
    /// Parses the stored comma-joined representation.
    ///
    /// Empty segments are ignored.
    ///
    /// ## Errors
    /// Returns [`CoreError::ParseError`] if any segment is not a valid key.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        raw.split(EXDATE_SEPARATOR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::parse)
            .collect::<CoreResult<BTreeSet<_>>>()
            .map(Self)
    }

    /// Adds a key; returns false if it was already present.
    pub fn insert(&mut self, key: ExceptionKey) -> bool {
        self.0.insert(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceptionKey> {
        self.0.iter()
    }

    /// Number of keys strictly before `cutoff`.
    #[must_use]
    pub fn count_before(&self, cutoff: TimeValue, tz: Tz) -> usize {
        self.0.iter().filter(|key| key.is_before(cutoff, tz)).count()
    }

    /// Drops every key at or after `cutoff`; returns how many were removed.
    pub fn truncate_at(&mut self, cutoff: TimeValue, tz: Tz) -> usize {
        let before = self.0.len();
        self.0.retain(|key| key.is_before(cutoff, tz));
        before - self.0.len()
    }
}

impl std::fmt::Display for ExceptionDateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for key in &self.0 {
            if !first {
                write!(f, "{EXDATE_SEPARATOR}")?;
            }
            write!(f, "{key}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<ExceptionKey> for ExceptionDateSet {
    fn from_iter<I: IntoIterator<Item = ExceptionKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_exception_key_formats() {
        let all_day = ExceptionKey::new(TimeValue::Date(date(2024, 1, 15)));
        assert_eq!(all_day.to_string(), "20240115");

        let timed = ExceptionKey::new(TimeValue::Utc(instant(2024, 1, 15, 9)));
        assert_eq!(timed.to_string(), "20240115T090000Z");
        assert_eq!("20240115T090000Z".parse::<ExceptionKey>().unwrap(), timed);
        assert_eq!("20240115".parse::<ExceptionKey>().unwrap(), all_day);
    }

    #[test]
    fn test_exception_key_rejects_garbage() {
        assert!("2024-01-15".parse::<ExceptionKey>().is_err());
        assert!("20241315".parse::<ExceptionKey>().is_err());
    }

    #[test]
    fn test_exception_date_set_parse_sorts_and_dedups() {
        let set = ExceptionDateSet::parse("20240122T090000Z, 20240108T090000Z,,20240108T090000Z")
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "20240108T090000Z,20240122T090000Z");
        assert!(ExceptionDateSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_exception_date_set_cutoff() {
        let mut set =
            ExceptionDateSet::parse("20240108T090000Z,20240115T090000Z,20240122T090000Z").unwrap();
        let cutoff = TimeValue::Utc(instant(2024, 1, 15, 9));

        assert_eq!(set.count_before(cutoff, Tz::UTC), 1);
        assert_eq!(set.truncate_at(cutoff, Tz::UTC), 2);
        assert_eq!(set.to_string(), "20240108T090000Z");
    }

    #[test]
    fn test_midnight_detection_uses_timezone() {
        let value = TimeValue::Utc(instant(2024, 3, 1, 23));
        assert!(!value.is_local_midnight(Tz::UTC));
        assert!(value.is_local_midnight(Tz::Etc__GMTMinus1));
        assert_eq!(value.local_date(Tz::Etc__GMTMinus1), date(2024, 3, 2));
    }

    #[test]
    fn test_compare_across_kinds() {
        let all_day = TimeValue::Date(date(2024, 3, 2));
        let timed = TimeValue::Utc(instant(2024, 3, 1, 12));
        assert_eq!(all_day.compare(timed, Tz::UTC), Ordering::Greater);
        assert_eq!(
            all_day.shifted(TimeDelta::days(-1)),
            TimeValue::Date(date(2024, 3, 1))
        );
    }
}
