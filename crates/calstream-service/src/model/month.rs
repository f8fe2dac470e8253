use chrono::{Datelike, Months, NaiveDate};

use super::{ListModel, NextItem};
use calstream_core::types::Direction;

/// An entry of a month-grouped listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Occurrence(NextItem),
    /// Placeholder for a month without any occurrence.
    /// Carries the month's first day.
    EmptyMonth(NaiveDate),
}

/// ## Summary
/// Wraps a [`ListModel`] and inserts one [`ListEntry::EmptyMonth`] for
/// every month, from the anchor's month on, that produced no occurrence
/// before the scan moved past it.
///
/// The month cursor is independent of the wrapped model's day cursor.
/// No placeholders are produced after the wrapped model runs dry.
#[derive(Debug)]
pub struct MonthGroupedModel {
    inner: ListModel,
    current_month: NaiveDate,
    month_has_entries: bool,
    pending: Option<NextItem>,
}

impl MonthGroupedModel {
    #[must_use]
    pub fn new(inner: ListModel, anchor: NaiveDate) -> Self {
        Self {
            inner,
            current_month: first_of_month(anchor),
            month_has_entries: false,
            pending: None,
        }
    }

    pub fn prefetch(&mut self, fill_both: bool) {
        self.inner.prefetch(fill_both);
    }

    pub fn eof(&mut self) -> bool {
        self.pending.is_none() && self.inner.eof()
    }

    fn is_ahead(&self, month: NaiveDate) -> bool {
        match self.inner.direction() {
            Direction::Forward => month > self.current_month,
            Direction::Backward => month < self.current_month,
        }
    }

    /// Moves the month cursor one month toward `target`.
    fn step_month(&mut self, target: NaiveDate) {
        let next = match self.inner.direction() {
            Direction::Forward => self.current_month.checked_add_months(Months::new(1)),
            Direction::Backward => self.current_month.checked_sub_months(Months::new(1)),
        };
        self.current_month = next.unwrap_or(target);
        self.month_has_entries = false;
    }
}

impl Iterator for MonthGroupedModel {
    type Item = ListEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            self.pending = self.inner.next();
        }
        let month = first_of_month(self.pending.as_ref()?.date);

        while self.is_ahead(month) {
            if !self.month_has_entries {
                let empty = self.current_month;
                self.step_month(month);
                tracing::trace!(month = %empty, "Emitting empty-month placeholder");
                return Some(ListEntry::EmptyMonth(empty));
            }
            self.step_month(month);
        }

        self.month_has_entries = true;
        self.pending.take().map(ListEntry::Occurrence)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedStream;
    use calstream_core::types::Category;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn grouped(
        direction: Direction,
        anchor: NaiveDate,
        days: &[(NaiveDate, &str)],
    ) -> MonthGroupedModel {
        let inner = ListModel::new(direction)
            .with_stream(ScriptedStream::boxed(Category::AllDay, days));
        MonthGroupedModel::new(inner, anchor)
    }

    fn labels(model: &mut MonthGroupedModel) -> Vec<String> {
        model
            .by_ref()
            .map(|entry| match entry {
                ListEntry::Occurrence(item) => item.occurrence.summary,
                ListEntry::EmptyMonth(month) => format!("empty {month}"),
            })
            .collect()
    }

    #[test]
    fn test_forward_placeholders_follow_a_busy_month() {
        let mut model = grouped(
            Direction::Forward,
            day(1, 15),
            &[(day(1, 20), "a"), (day(1, 25), "b"), (day(4, 3), "c")],
        );
        assert_eq!(
            labels(&mut model),
            vec!["a", "b", "empty 2024-02-01", "empty 2024-03-01", "c"]
        );
    }

    #[test]
    fn test_forward_empty_anchor_month_gets_one_placeholder() {
        let mut model = grouped(
            Direction::Forward,
            day(1, 10),
            &[(day(3, 5), "x"), (day(3, 6), "y")],
        );
        assert_eq!(
            labels(&mut model),
            vec!["empty 2024-01-01", "empty 2024-02-01", "x", "y"]
        );
        // Nothing trails the last occurrence.
        assert!(model.eof());
        assert!(model.next().is_none());
    }

    #[test]
    fn test_backward_walks_months_in_reverse() {
        let mut model = grouped(
            Direction::Backward,
            day(6, 5),
            &[(day(5, 10), "m"), (day(5, 2), "n"), (day(2, 2), "f")],
        );
        assert_eq!(
            labels(&mut model),
            vec![
                "empty 2024-06-01",
                "m",
                "n",
                "empty 2024-04-01",
                "empty 2024-03-01",
                "f",
            ]
        );
    }

    #[test]
    fn test_no_placeholders_without_occurrences() {
        let mut model = grouped(Direction::Forward, day(1, 1), &[]);
        assert!(model.next().is_none());
        assert!(model.eof());
    }
}
