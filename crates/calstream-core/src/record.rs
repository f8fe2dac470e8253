//! Record shapes exchanged with the record store and handed to views.

use std::cmp::Ordering;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::recurrence::RecurrenceRule;
use crate::time::{ExceptionDateSet, ExceptionKey, TimeValue};
use crate::types::Category;

/// An original or exception event as persisted in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Assigned by the store on insert.
    #[serde(default)]
    pub id: i64,
    pub book_id: i64,
    pub summary: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub start: TimeValue,
    pub end: TimeValue,
    #[serde(default)]
    pub rule: RecurrenceRule,
    /// Serialized [`ExceptionDateSet`].
    #[serde(default)]
    pub exdate: String,
    /// Set only on exception records.
    #[serde(default)]
    pub original_event_id: Option<i64>,
    /// Exception key of the occurrence an exception record overrides.
    #[serde(default)]
    pub recurrence_id: Option<ExceptionKey>,
}

impl EventRecord {
    #[must_use]
    pub fn new(book_id: i64, summary: impl Into<String>, start: TimeValue, end: TimeValue) -> Self {
        Self {
            id: 0,
            book_id,
            summary: summary.into(),
            location: String::new(),
            description: String::new(),
            start,
            end,
            rule: RecurrenceRule::none(),
            exdate: String::new(),
            original_event_id: None,
            recurrence_id: None,
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = rule;
        self
    }

    #[must_use]
    pub const fn is_exception(&self) -> bool {
        self.original_event_id.is_some()
    }

    /// ## Summary
    /// Parses the stored exception-date list.
    ///
    /// ## Errors
    /// Returns a parse error if the stored list is malformed.
    pub fn exception_dates(&self) -> CoreResult<ExceptionDateSet> {
        ExceptionDateSet::parse(&self.exdate)
    }

    pub fn set_exception_dates(&mut self, dates: &ExceptionDateSet) {
        self.exdate = dates.to_string();
    }

    /// Overwrites the editable fields with `draft`; the rule is only
    /// replaced when the draft carries one.
    pub fn apply_draft(&mut self, draft: &EventDraft) {
        self.summary.clone_from(&draft.summary);
        self.location.clone_from(&draft.location);
        self.description.clone_from(&draft.description);
        self.start = draft.start;
        self.end = draft.end;
        if let Some(rule) = &draft.rule {
            self.rule = rule.clone();
        }
    }
}

/// A generated per-occurrence view row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub event_id: i64,
    pub book_id: i64,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: TimeValue,
    pub end: TimeValue,
    pub original_event_id: Option<i64>,
    pub recurrence_id: Option<ExceptionKey>,
    pub has_rule: bool,
}

/// Which view of the store a record (or query) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFlavor {
    Original,
    TimedInstance,
    AllDayInstance,
}

impl RecordFlavor {
    #[must_use]
    pub const fn for_category(category: Category) -> Self {
        match category {
            Category::AllDay => Self::AllDayInstance,
            Category::Timed => Self::TimedInstance,
        }
    }
}

/// Queryable fields shared by every record flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    EventId,
    BookId,
    Start,
    End,
    Summary,
    Location,
    Description,
    OriginalEventId,
    RecurrenceId,
    HasRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Text(String),
    Time(TimeValue),
}

impl FieldValue {
    /// Orders two values of the same shape; mixed shapes are unordered.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) if a.same_kind(*b) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// A raw record read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum Record {
    Original(EventRecord),
    TimedInstance(InstanceRecord),
    AllDayInstance(InstanceRecord),
}

impl Record {
    /// Wraps a generated instance in the flavor its start implies.
    #[must_use]
    pub const fn instance(instance: InstanceRecord) -> Self {
        if instance.start.is_all_day() {
            Self::AllDayInstance(instance)
        } else {
            Self::TimedInstance(instance)
        }
    }

    #[must_use]
    pub const fn flavor(&self) -> RecordFlavor {
        match self {
            Self::Original(_) => RecordFlavor::Original,
            Self::TimedInstance(_) => RecordFlavor::TimedInstance,
            Self::AllDayInstance(_) => RecordFlavor::AllDayInstance,
        }
    }

    #[must_use]
    pub const fn start(&self) -> TimeValue {
        match self {
            Self::Original(event) => event.start,
            Self::TimedInstance(instance) | Self::AllDayInstance(instance) => instance.start,
        }
    }

    #[must_use]
    pub const fn end(&self) -> TimeValue {
        match self {
            Self::Original(event) => event.end,
            Self::TimedInstance(instance) | Self::AllDayInstance(instance) => instance.end,
        }
    }

    /// Flavor-specific accessor for a queryable field.
    #[must_use]
    pub fn field(&self, field: Field) -> Option<FieldValue> {
        match self {
            Self::Original(event) => original_field(event, field),
            Self::TimedInstance(instance) | Self::AllDayInstance(instance) => {
                instance_field(instance, field)
            }
        }
    }
}

fn original_field(event: &EventRecord, field: Field) -> Option<FieldValue> {
    Some(match field {
        Field::EventId => FieldValue::Int(event.id),
        Field::BookId => FieldValue::Int(event.book_id),
        Field::Start => FieldValue::Time(event.start),
        Field::End => FieldValue::Time(event.end),
        Field::Summary => FieldValue::Text(event.summary.clone()),
        Field::Location => FieldValue::Text(event.location.clone()),
        Field::Description => FieldValue::Text(event.description.clone()),
        Field::OriginalEventId => FieldValue::Int(event.original_event_id?),
        Field::RecurrenceId => FieldValue::Text(event.recurrence_id?.to_string()),
        Field::HasRule => FieldValue::Bool(event.rule.is_recurring()),
    })
}

fn instance_field(instance: &InstanceRecord, field: Field) -> Option<FieldValue> {
    Some(match field {
        Field::EventId => FieldValue::Int(instance.event_id),
        Field::BookId => FieldValue::Int(instance.book_id),
        Field::Start => FieldValue::Time(instance.start),
        Field::End => FieldValue::Time(instance.end),
        Field::Summary => FieldValue::Text(instance.summary.clone()),
        Field::Location => FieldValue::Text(instance.location.clone()),
        Field::Description => FieldValue::Text(instance.description.clone()),
        Field::OriginalEventId => FieldValue::Int(instance.original_event_id?),
        Field::RecurrenceId => FieldValue::Text(instance.recurrence_id?.to_string()),
        Field::HasRule => FieldValue::Bool(instance.has_rule),
    })
}

/// One calendar appearance of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub event_id: i64,
    pub book_id: i64,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: TimeValue,
    pub end: TimeValue,
    pub original_event_id: Option<i64>,
    pub recurrence_id: Option<ExceptionKey>,
    pub has_rule: bool,
}

impl From<Record> for Occurrence {
    fn from(record: Record) -> Self {
        match record {
            Record::Original(event) => Self {
                event_id: event.id,
                book_id: event.book_id,
                has_rule: event.rule.is_recurring(),
                summary: event.summary,
                location: event.location,
                description: event.description,
                start: event.start,
                end: event.end,
                original_event_id: event.original_event_id,
                recurrence_id: event.recurrence_id,
            },
            Record::TimedInstance(instance) | Record::AllDayInstance(instance) => Self {
                event_id: instance.event_id,
                book_id: instance.book_id,
                summary: instance.summary,
                location: instance.location,
                description: instance.description,
                start: instance.start,
                end: instance.end,
                original_event_id: instance.original_event_id,
                recurrence_id: instance.recurrence_id,
                has_rule: instance.has_rule,
            },
        }
    }
}

impl Occurrence {
    #[must_use]
    pub const fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    #[must_use]
    pub const fn is_exception(&self) -> bool {
        self.original_event_id.is_some()
    }

    /// Id of the original event owning the series this occurrence belongs to.
    #[must_use]
    pub fn series_id(&self) -> i64 {
        self.original_event_id.unwrap_or(self.event_id)
    }

    /// Key identifying this occurrence within its series.
    #[must_use]
    pub fn exception_key(&self) -> ExceptionKey {
        self.recurrence_id
            .unwrap_or_else(|| ExceptionKey::new(self.start))
    }

    /// Start and end share a representation and are ordered.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.start.same_kind(self.end) && self.start <= self.end
    }

    #[must_use]
    pub fn first_day(&self, tz: Tz) -> NaiveDate {
        self.start.local_date(tz)
    }

    /// Last calendar day the occurrence occupies.
    ///
    /// A timed occurrence ending exactly on local midnight ends the previous
    /// day, unless it is zero-length.
    #[must_use]
    pub fn last_day(&self, tz: Tz) -> NaiveDate {
        let end_date = self.end.local_date(tz);
        if self.end.is_local_midnight(tz) && self.end > self.start {
            end_date.pred_opt().unwrap_or(end_date)
        } else {
            end_date
        }
    }
}

/// Edited working copy of an event, applied by the edit-scope resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: TimeValue,
    pub end: TimeValue,
    /// `None` keeps the series' current rule.
    pub rule: Option<RecurrenceRule>,
}

impl EventDraft {
    /// Starts an edit from the occurrence as it is currently shown.
    #[must_use]
    pub fn from_occurrence(occurrence: &Occurrence) -> Self {
        Self {
            summary: occurrence.summary.clone(),
            location: occurrence.location.clone(),
            description: occurrence.description.clone(),
            start: occurrence.start,
            end: occurrence.end,
            rule: None,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub const fn with_times(mut self, start: TimeValue, end: TimeValue) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = Some(rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn timed(start: (u32, u32), end: (u32, u32)) -> Occurrence {
        let start = TimeValue::Utc(Utc.with_ymd_and_hms(2024, 3, start.0, start.1, 0, 0).unwrap());
        let end = TimeValue::Utc(Utc.with_ymd_and_hms(2024, 3, end.0, end.1, 0, 0).unwrap());
        Occurrence::from(Record::instance(InstanceRecord {
            event_id: 1,
            book_id: 1,
            summary: "x".to_string(),
            location: String::new(),
            description: String::new(),
            start,
            end,
            original_event_id: None,
            recurrence_id: None,
            has_rule: false,
        }))
    }

    #[test]
    fn test_midnight_end_belongs_to_previous_day() {
        let occurrence = timed((1, 0), (2, 0));
        assert_eq!(
            occurrence.last_day(Tz::UTC),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_zero_length_midnight_keeps_its_day() {
        let occurrence = timed((2, 0), (2, 0));
        assert_eq!(
            occurrence.last_day(Tz::UTC),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_exception_key_prefers_recurrence_id() {
        let mut occurrence = timed((4, 9), (4, 10));
        assert_eq!(occurrence.exception_key().to_string(), "20240304T090000Z");

        occurrence.recurrence_id = Some("20240303T090000Z".parse().unwrap());
        occurrence.original_event_id = Some(7);
        assert_eq!(occurrence.exception_key().to_string(), "20240303T090000Z");
        assert_eq!(occurrence.series_id(), 7);
    }

    #[test]
    fn test_field_dispatch_per_flavor() {
        let event = EventRecord::new(
            3,
            "Standup",
            TimeValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            TimeValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        let record = Record::Original(event);
        assert_eq!(record.flavor(), RecordFlavor::Original);
        assert_eq!(record.field(Field::BookId), Some(FieldValue::Int(3)));
        assert_eq!(record.field(Field::OriginalEventId), None);
        assert_eq!(record.field(Field::HasRule), Some(FieldValue::Bool(false)));
    }

    #[test]
    fn test_record_serde_shape() {
        let json = serde_json::json!({
            "flavor": "original",
            "book_id": 1,
            "summary": "Review",
            "start": { "kind": "date", "value": "2024-03-01" },
            "end": { "kind": "date", "value": "2024-03-03" }
        });
        let record: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record.start().category(), Category::AllDay);
    }
}
