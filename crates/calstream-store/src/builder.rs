//! Query and filter construction for occurrence streams.
//!
//! All-day views compare against floating dates; timed views compare
//! against the UTC instant of the local day boundary.

use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::record::{Field, FieldValue, RecordFlavor};
use calstream_core::time::{TimeValue, day_start};
use calstream_core::types::{Category, Direction, SortOrder};
use chrono::NaiveDate;

use crate::filter::{CompareOp, Filter, Query};

/// Optional constraints AND-composed onto a stream query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListConstraints {
    pub visible_only: bool,
    pub editable_only: bool,
    pub keyword: Option<String>,
}

impl ListConstraints {
    #[must_use]
    pub const fn visible() -> Self {
        Self {
            visible_only: true,
            editable_only: false,
            keyword: None,
        }
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    #[must_use]
    pub const fn editable(mut self) -> Self {
        self.editable_only = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    env: Arc<Environment>,
}

impl QueryBuilder {
    #[must_use]
    pub const fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    /// Value of the boundary at which `date` begins, in the category's representation.
    fn day_boundary(&self, date: NaiveDate, category: Category) -> FieldValue {
        FieldValue::Time(match category {
            Category::AllDay => TimeValue::Date(date),
            Category::Timed => TimeValue::Utc(day_start(date, self.env.timezone)),
        })
    }

    fn next_day(date: NaiveDate) -> NaiveDate {
        date.succ_opt().unwrap_or(date)
    }

    /// "Starts on or before `date`."
    fn starts_by(&self, date: NaiveDate, category: Category) -> Filter {
        match category {
            Category::AllDay => {
                Filter::compare(Field::Start, CompareOp::Le, self.day_boundary(date, category))
            }
            Category::Timed => Filter::compare(
                Field::Start,
                CompareOp::Lt,
                self.day_boundary(Self::next_day(date), category),
            ),
        }
    }

    /// "Still occupies `date` or a later day."
    ///
    /// A timed end on the day boundary itself belongs to the previous day,
    /// except for zero-length events starting on that boundary.
    fn occupies_from(&self, date: NaiveDate, category: Category) -> Filter {
        let boundary = self.day_boundary(date, category);
        match category {
            Category::AllDay => Filter::compare(Field::End, CompareOp::Ge, boundary),
            Category::Timed => Filter::Or(vec![
                Filter::compare(Field::End, CompareOp::Gt, boundary.clone()),
                Filter::compare(Field::Start, CompareOp::Ge, boundary),
            ]),
        }
    }

    /// ## Summary
    /// Occurrences starting at (forward) or before (backward) `anchor`,
    /// sorted by start in scan order.
    #[must_use]
    pub fn simple_query(
        &self,
        anchor: NaiveDate,
        direction: Direction,
        category: Category,
    ) -> Query {
        let boundary = self.day_boundary(anchor, category);
        let filter = match direction {
            Direction::Forward => Filter::compare(Field::Start, CompareOp::Ge, boundary),
            Direction::Backward => Filter::compare(Field::Start, CompareOp::Lt, boundary),
        };
        Query::new(RecordFlavor::for_category(category))
            .and_filter(Some(filter))
            .sort_by(Field::Start, direction.sort_order())
            .sort_by(Field::EventId, SortOrder::Ascending)
    }

    /// ## Summary
    /// Occurrences overlapping the day range `[from, to)`, ascending by start.
    #[must_use]
    pub fn range_query(&self, from: NaiveDate, to: NaiveDate, category: Category) -> Query {
        let last = to.pred_opt().unwrap_or(to);
        let filter = Filter::all([
            Some(self.starts_by(last, category)),
            Some(self.occupies_from(from, category)),
        ]);
        Query::new(RecordFlavor::for_category(category))
            .and_filter(filter)
            .sort_by(Field::Start, SortOrder::Ascending)
            .sort_by(Field::EventId, SortOrder::Ascending)
    }

    /// Keeps occurrences that touch the supported calendar range.
    fn bounds_guard(&self, category: Category) -> Option<Filter> {
        Filter::all([
            Some(self.starts_by(self.env.upper_bound, category)),
            Some(self.occupies_from(self.env.lower_bound, category)),
        ])
    }

    /// ## Summary
    /// Occurrences visible on `anchor` or beyond it in scan direction,
    /// guarded on both sides by the supported calendar bound.
    ///
    /// An anchor outside the bound is clamped onto it. Forward scans sort
    /// by start ascending; backward scans by end descending so that the
    /// latest-ending occurrence surfaces first.
    #[must_use]
    pub fn complex_query(
        &self,
        anchor: NaiveDate,
        direction: Direction,
        category: Category,
    ) -> Query {
        let anchor = self.env.clamp_to_bounds(anchor);
        let query = Query::new(RecordFlavor::for_category(category));
        match direction {
            Direction::Forward => query
                .and_filter(Filter::all([
                    Some(self.occupies_from(anchor, category)),
                    self.bounds_guard(category),
                ]))
                .sort_by(Field::Start, SortOrder::Ascending)
                .sort_by(Field::EventId, SortOrder::Ascending),
            Direction::Backward => query
                .and_filter(Filter::all([
                    Some(self.starts_by(anchor, category)),
                    self.bounds_guard(category),
                ]))
                .sort_by(Field::End, SortOrder::Descending)
                .sort_by(Field::EventId, SortOrder::Ascending),
        }
    }

    /// ## Summary
    /// Composes the optional list constraints with AND semantics.
    ///
    /// Returns `None` when no predicate applies.
    #[must_use]
    pub fn list_filter(&self, category: Category, constraints: &ListConstraints) -> Option<Filter> {
        let visible = constraints.visible_only.then(|| {
            Filter::Or(
                self.env
                    .visible_books
                    .iter()
                    .map(|book| {
                        Filter::compare(Field::BookId, CompareOp::Eq, FieldValue::Int(*book))
                    })
                    .collect(),
            )
        });

        let editable = if constraints.editable_only {
            Filter::all(self.env.non_editable_books().map(|book| {
                Some(Filter::compare(
                    Field::BookId,
                    CompareOp::Ne,
                    FieldValue::Int(book),
                ))
            }))
        } else {
            None
        };

        let keyword = constraints
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(|keyword| {
                Filter::Or(
                    [Field::Summary, Field::Description, Field::Location]
                        .into_iter()
                        .map(|field| {
                            let needle = FieldValue::Text(keyword.to_string());
                            Filter::compare(field, CompareOp::Contains, needle)
                        })
                        .collect(),
                )
            });

        let filter = Filter::all([visible, editable, keyword]);
        tracing::trace!(%category, has_filter = filter.is_some(), "Built list filter");
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calstream_core::record::{InstanceRecord, Record};
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn builder(env: Environment) -> QueryBuilder {
        QueryBuilder::new(Arc::new(env))
    }

    fn instance(start: TimeValue, end: TimeValue, book_id: i64, summary: &str) -> Record {
        Record::instance(InstanceRecord {
            event_id: 1,
            book_id,
            summary: summary.to_string(),
            location: String::new(),
            description: "weekly sync".to_string(),
            start,
            end,
            original_event_id: None,
            recurrence_id: None,
            has_rule: false,
        })
    }

    fn timed(d: u32, h: u32) -> TimeValue {
        TimeValue::Utc(Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_complex_forward_excludes_midnight_end() {
        let query = builder(Environment::default()).complex_query(
            date(2024, 3, 2),
            Direction::Forward,
            Category::Timed,
        );
        assert!(!query.matches(&instance(timed(1, 0), timed(2, 0), 1, "a")));
        assert!(query.matches(&instance(timed(1, 23), timed(2, 1), 1, "b")));
        assert!(query.matches(&instance(timed(2, 0), timed(2, 0), 1, "zero-length")));
    }

    #[test]
    fn test_complex_backward_uses_local_day() {
        let env = Environment::default().with_timezone(Tz::Etc__GMTMinus2);
        let query =
            builder(env).complex_query(date(2024, 3, 2), Direction::Backward, Category::Timed);
        // 22:30 UTC on the 2nd is already the 3rd in UTC+2.
        let late = TimeValue::Utc(Utc.with_ymd_and_hms(2024, 3, 2, 22, 30, 0).unwrap());
        assert!(!query.matches(&instance(late, late, 1, "late")));
        assert!(query.matches(&instance(timed(2, 9), timed(2, 10), 1, "morning")));
    }

    #[test]
    fn test_complex_query_guards_both_bounds() {
        let qb = builder(Environment::default());
        let day = |y, m, d| TimeValue::Date(date(y, m, d));
        let ancient = instance(day(1901, 6, 1), day(1901, 6, 1), 1, "ancient");
        let straddling = instance(day(1901, 12, 30), day(1902, 1, 2), 1, "straddling");
        let far = instance(day(2039, 6, 1), day(2039, 6, 1), 1, "far");
        let modern = instance(day(2024, 3, 1), day(2024, 3, 1), 1, "modern");

        let forward = qb.complex_query(date(1900, 1, 1), Direction::Forward, Category::AllDay);
        assert!(!forward.matches(&ancient));
        assert!(forward.matches(&straddling));
        assert!(forward.matches(&modern));
        assert!(!forward.matches(&far));

        let backward = qb.complex_query(date(2040, 1, 1), Direction::Backward, Category::AllDay);
        assert!(!backward.matches(&far));
        assert!(backward.matches(&modern));
        assert!(backward.matches(&straddling));
        assert!(!backward.matches(&ancient));
    }

    #[test]
    fn test_simple_query_boundaries() {
        let qb = builder(Environment::default());
        let day = |d| TimeValue::Date(date(2024, 3, d));
        let forward = qb.simple_query(date(2024, 3, 2), Direction::Forward, Category::AllDay);
        let backward = qb.simple_query(date(2024, 3, 2), Direction::Backward, Category::AllDay);

        assert!(forward.matches(&instance(day(2), day(2), 1, "x")));
        assert!(!backward.matches(&instance(day(2), day(2), 1, "x")));
        assert!(backward.matches(&instance(day(1), day(3), 1, "x")));
    }

    #[test]
    fn test_range_query_is_half_open() {
        let qb = builder(Environment::default());
        let day = |d| TimeValue::Date(date(2024, 3, d));
        let query = qb.range_query(date(2024, 3, 2), date(2024, 3, 4), Category::AllDay);

        assert!(query.matches(&instance(day(1), day(2), 1, "x")));
        assert!(query.matches(&instance(day(3), day(3), 1, "x")));
        assert!(!query.matches(&instance(day(4), day(5), 1, "x")));
        assert!(!query.matches(&instance(day(1), day(1), 1, "x")));
    }

    #[test]
    fn test_list_filter_composition() {
        let env = Environment::default()
            .with_visible_books([1, 2])
            .with_read_only_books([2])
            .with_birthday_books([5]);
        let qb = builder(env);
        let day = TimeValue::Date(date(2024, 3, 1));

        assert_eq!(qb.list_filter(Category::AllDay, &ListConstraints::default()), None);
        assert_eq!(
            qb.list_filter(Category::AllDay, &ListConstraints::default().with_keyword("   ")),
            None
        );

        let filter = qb
            .list_filter(
                Category::AllDay,
                &ListConstraints::visible().editable().with_keyword("SYNC"),
            )
            .unwrap();
        assert!(filter.matches(&instance(day, day, 1, "Planning")));
        assert!(!filter.matches(&instance(day, day, 2, "Planning")));
        assert!(!filter.matches(&instance(day, day, 3, "Planning")));
    }
}
