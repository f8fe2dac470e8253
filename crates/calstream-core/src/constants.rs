use chrono::NaiveDate;

/// Number of records requested per page from the record store.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// First day the engine will stream occurrences for.
pub const CALENDAR_LOWER_BOUND: NaiveDate = match NaiveDate::from_ymd_opt(1902, 1, 1) {
    Some(date) => date,
    None => NaiveDate::MIN,
};

/// Last day the engine will stream occurrences for.
pub const CALENDAR_UPPER_BOUND: NaiveDate = match NaiveDate::from_ymd_opt(2037, 12, 31) {
    Some(date) => date,
    None => NaiveDate::MAX,
};

/// Separator used when an exception-date set is stored on an event record.
pub const EXDATE_SEPARATOR: char = ',';
