//! Injected calendar environment.
//!
//! Replaces process-wide settings, locale and book managers: every component
//! that needs them receives an `Arc<Environment>` at construction.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;

use crate::constants::{CALENDAR_LOWER_BOUND, CALENDAR_UPPER_BOUND, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct Environment {
    /// Timezone used for every day-level computation on timed values.
    pub timezone: Tz,
    pub first_day_of_week: Weekday,
    /// Records requested per page by block fetchers.
    pub page_size: usize,
    /// Books whose events are shown when a visibility filter is requested.
    pub visible_books: BTreeSet<i64>,
    pub read_only_books: BTreeSet<i64>,
    pub birthday_books: BTreeSet<i64>,
    pub lower_bound: NaiveDate,
    pub upper_bound: NaiveDate,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            first_day_of_week: Weekday::Mon,
            page_size: DEFAULT_PAGE_SIZE,
            visible_books: BTreeSet::new(),
            read_only_books: BTreeSet::new(),
            birthday_books: BTreeSet::new(),
            lower_bound: CALENDAR_LOWER_BOUND,
            upper_bound: CALENDAR_UPPER_BOUND,
        }
    }
}

impl Environment {
    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_visible_books(mut self, books: impl IntoIterator<Item = i64>) -> Self {
        self.visible_books = books.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_read_only_books(mut self, books: impl IntoIterator<Item = i64>) -> Self {
        self.read_only_books = books.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_birthday_books(mut self, books: impl IntoIterator<Item = i64>) -> Self {
        self.birthday_books = books.into_iter().collect();
        self
    }

    /// Returns true if `date` lies within the supported calendar bound.
    #[must_use]
    pub fn in_bounds(&self, date: NaiveDate) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&date)
    }

    /// Nearest date to `date` within the supported calendar bound.
    #[must_use]
    pub fn clamp_to_bounds(&self, date: NaiveDate) -> NaiveDate {
        date.max(self.lower_bound).min(self.upper_bound)
    }

    /// Books whose events may not be edited from the list views.
    pub fn non_editable_books(&self) -> impl Iterator<Item = i64> + '_ {
        self.read_only_books.union(&self.birthday_books).copied()
    }
}
