//! Edit and delete scopes for recurring events.
//!
//! A recurring series is one original event record plus any number of
//! exception records pointing back at it. Editing "only this" occurrence
//! adds an exception; "this and future" splits the series in two; "all"
//! rewrites the original in place.

use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::record::{
    EventDraft, EventRecord, Field, FieldValue, Occurrence, Record, RecordFlavor,
};
use calstream_core::recurrence::{RecurrenceRule, Until};
use calstream_core::time::{ExceptionKey, TimeValue};
use calstream_core::types::{Category, SortOrder};
use calstream_store::{CompareOp, Filter, Query, RecordStore};

use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditScope {
    OnlyThis,
    ThisAndFuture,
    All,
}

/// Record ids touched by an edit or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub updated: Vec<i64>,
    pub inserted: Vec<i64>,
    pub deleted: Vec<i64>,
}

/// Resolves edit scopes against the record store.
#[derive(Clone)]
pub struct RecurrenceEditor {
    store: Arc<dyn RecordStore>,
    env: Arc<Environment>,
}

impl std::fmt::Debug for RecurrenceEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrenceEditor")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl RecurrenceEditor {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, env: Arc<Environment>) -> Self {
        Self { store, env }
    }

    /// ## Summary
    /// Applies `draft` to `occurrence` with the given scope.
    ///
    /// Non-recurring events are always updated in place.
    ///
    /// ## Errors
    /// Returns store errors, or a parse error if the stored exception-date
    /// list is malformed.
    pub fn update(
        &self,
        occurrence: &Occurrence,
        draft: &EventDraft,
        scope: EditScope,
    ) -> ServiceResult<EditOutcome> {
        let original = self.store.get_event(occurrence.series_id())?;
        tracing::info!(
            event_id = original.id,
            occurrence = %occurrence.exception_key(),
            ?scope,
            "Updating event"
        );

        if !original.rule.is_recurring() && !occurrence.is_exception() {
            return self.update_all(original, occurrence, draft);
        }
        match scope {
            EditScope::OnlyThis => self.update_only_this(original, occurrence, draft),
            EditScope::ThisAndFuture => self.update_this_and_future(original, occurrence, draft),
            EditScope::All => self.update_all(original, occurrence, draft),
        }
    }

    /// ## Summary
    /// Deletes `occurrence` with the given scope.
    ///
    /// ## Errors
    /// Returns store errors, or a parse error if the stored exception-date
    /// list is malformed.
    pub fn delete(&self, occurrence: &Occurrence, scope: EditScope) -> ServiceResult<EditOutcome> {
        let original = self.store.get_event(occurrence.series_id())?;
        tracing::info!(
            event_id = original.id,
            occurrence = %occurrence.exception_key(),
            ?scope,
            "Deleting event"
        );

        if !original.rule.is_recurring() && !occurrence.is_exception() {
            return self.delete_series(original.id);
        }
        match scope {
            EditScope::OnlyThis => self.delete_only_this(original, occurrence),
            EditScope::ThisAndFuture => {
                let cutoff = occurrence.exception_key().time();
                let count = self.instance_count_before(&original, cutoff)?;
                if count == 0 {
                    return self.delete_series(original.id);
                }
                let mut original = original;
                self.truncate(&mut original, cutoff, count)
            }
            EditScope::All => self.delete_series(original.id),
        }
    }

    /// ## Summary
    /// Number of occurrences the rule produced strictly before `cutoff`.
    ///
    /// Sums the store-generated instances before the cutoff and the
    /// exception dates before it: suppressed occurrences are missing from
    /// the store count but still consumed the rule's range.
    ///
    /// ## Errors
    /// Returns store errors, or a parse error for a malformed exception list.
    pub fn instance_count_before(
        &self,
        original: &EventRecord,
        cutoff: TimeValue,
    ) -> ServiceResult<usize> {
        let tz = self.env.timezone;
        let category = original.start.category();
        let bound = match category {
            Category::AllDay => TimeValue::Date(cutoff.local_date(tz)),
            Category::Timed => TimeValue::Utc(cutoff.to_utc(tz)),
        };
        let query = Query::new(RecordFlavor::for_category(category)).and_filter(Filter::all([
            Some(Filter::compare(
                Field::EventId,
                CompareOp::Eq,
                FieldValue::Int(original.id),
            )),
            Some(Filter::compare(Field::Start, CompareOp::Lt, FieldValue::Time(bound))),
        ]));

        let generated = self.store.count(&query)?;
        let suppressed = original.exception_dates()?.count_before(cutoff, tz);
        tracing::debug!(
            event_id = original.id,
            cutoff = %cutoff,
            generated,
            suppressed,
            "Counted instances before cutoff"
        );
        Ok(generated + suppressed)
    }

    fn update_only_this(
        &self,
        mut original: EventRecord,
        occurrence: &Occurrence,
        draft: &EventDraft,
    ) -> ServiceResult<EditOutcome> {
        let mut outcome = EditOutcome::default();

        if occurrence.is_exception() {
            let mut exception = self.store.get_event(occurrence.event_id)?;
            apply_to_exception(&mut exception, draft);
            self.store.update_event(&exception)?;
            outcome.updated.push(exception.id);
            return Ok(outcome);
        }

        let key = occurrence.exception_key();
        let mut exdates = original.exception_dates()?;
        if exdates.insert(key) {
            original.set_exception_dates(&exdates);
            self.store.update_event(&original)?;
            outcome.updated.push(original.id);
        }

        let existing = self
            .exceptions_of(original.id)?
            .into_iter()
            .find(|exception| exception.recurrence_id == Some(key));
        if let Some(mut exception) = existing {
            apply_to_exception(&mut exception, draft);
            self.store.update_event(&exception)?;
            outcome.updated.push(exception.id);
        } else {
            let mut exception = EventRecord::new(original.book_id, "", draft.start, draft.end);
            apply_to_exception(&mut exception, draft);
            exception.original_event_id = Some(original.id);
            exception.recurrence_id = Some(key);
            outcome.inserted.push(self.store.insert_event(exception)?);
        }
        Ok(outcome)
    }

    fn update_this_and_future(
        &self,
        mut original: EventRecord,
        occurrence: &Occurrence,
        draft: &EventDraft,
    ) -> ServiceResult<EditOutcome> {
        let cutoff = occurrence.exception_key().time();
        let count = self.instance_count_before(&original, cutoff)?;
        if count == 0 {
            tracing::debug!(
                event_id = original.id,
                "Edited occurrence opens the series, editing all"
            );
            return self.update_all(original, occurrence, draft);
        }

        let successor_rule = draft
            .rule
            .clone()
            .unwrap_or_else(|| remaining_rule(&original.rule, count));
        let mut outcome = self.truncate(&mut original, cutoff, count)?;

        let mut successor = EventRecord::new(original.book_id, "", draft.start, draft.end);
        successor.apply_draft(draft);
        successor.rule = successor_rule;
        outcome.inserted.push(self.store.insert_event(successor)?);
        Ok(outcome)
    }

    fn update_all(
        &self,
        mut original: EventRecord,
        occurrence: &Occurrence,
        draft: &EventDraft,
    ) -> ServiceResult<EditOutcome> {
        let tz = self.env.timezone;
        let mut outcome = EditOutcome::default();

        for exception in self.exceptions_of(original.id)? {
            self.store.delete_event(exception.id)?;
            outcome.deleted.push(exception.id);
        }

        // Keep the series anchored: move its start by as much as the edit
        // moved this occurrence away from its slot.
        let slot = occurrence.exception_key().time();
        let (start, end) = if draft.start.same_kind(original.start) && draft.start.same_kind(slot) {
            let start = original.start.shifted(draft.start.since(slot, tz));
            (start, start.shifted(draft.end.since(draft.start, tz)))
        } else {
            (draft.start, draft.end)
        };

        original.apply_draft(draft);
        original.start = start;
        original.end = end;
        original.exdate.clear();
        self.store.update_event(&original)?;
        outcome.updated.push(original.id);
        Ok(outcome)
    }

    fn delete_only_this(
        &self,
        mut original: EventRecord,
        occurrence: &Occurrence,
    ) -> ServiceResult<EditOutcome> {
        let mut outcome = EditOutcome::default();
        let mut exdates = original.exception_dates()?;
        if exdates.insert(occurrence.exception_key()) {
            original.set_exception_dates(&exdates);
            self.store.update_event(&original)?;
            outcome.updated.push(original.id);
        }
        if occurrence.is_exception() {
            self.store.delete_event(occurrence.event_id)?;
            outcome.deleted.push(occurrence.event_id);
        }
        Ok(outcome)
    }

    fn delete_series(&self, id: i64) -> ServiceResult<EditOutcome> {
        self.store.delete_event(id)?;
        Ok(EditOutcome {
            deleted: vec![id],
            ..EditOutcome::default()
        })
    }

    /// Ends `original`'s range right before `cutoff` and drops the exception
    /// records and exception dates at or after it.
    fn truncate(
        &self,
        original: &mut EventRecord,
        cutoff: TimeValue,
        count: usize,
    ) -> ServiceResult<EditOutcome> {
        let tz = self.env.timezone;
        let mut outcome = EditOutcome::default();

        original.rule.until = match original.rule.until {
            Until::Count(_) => Until::Count(u32::try_from(count).unwrap_or(u32::MAX)),
            Until::Forever | Until::Date(_) => {
                let cutoff_day = cutoff.local_date(tz);
                Until::Date(cutoff_day.pred_opt().unwrap_or(cutoff_day))
            }
        };
        let mut exdates = original.exception_dates()?;
        exdates.truncate_at(cutoff, tz);
        original.set_exception_dates(&exdates);
        self.store.update_event(original)?;
        outcome.updated.push(original.id);
        tracing::debug!(event_id = original.id, until = ?original.rule.until, "Truncated series");

        for exception in self.exceptions_of(original.id)? {
            let at_or_after = exception
                .recurrence_id
                .is_some_and(|key: ExceptionKey| !key.is_before(cutoff, tz));
            if at_or_after {
                self.store.delete_event(exception.id)?;
                outcome.deleted.push(exception.id);
            }
        }
        Ok(outcome)
    }

    /// Every exception record of the series `series_id`.
    fn exceptions_of(&self, series_id: i64) -> ServiceResult<Vec<EventRecord>> {
        let query = Query::new(RecordFlavor::Original)
            .and_filter(Some(Filter::compare(
                Field::OriginalEventId,
                CompareOp::Eq,
                FieldValue::Int(series_id),
            )))
            .sort_by(Field::EventId, SortOrder::Ascending);

        let page_size = self.env.page_size.max(1);
        let mut exceptions = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.store.fetch(&query, offset, page_size)?;
            let len = page.len();
            offset += len;
            exceptions.extend(page.into_iter().filter_map(|record| match record {
                Record::Original(event) => Some(event),
                Record::TimedInstance(_) | Record::AllDayInstance(_) => None,
            }));
            if len < page_size {
                return Ok(exceptions);
            }
        }
    }
}

/// Exception records never recur.
fn apply_to_exception(exception: &mut EventRecord, draft: &EventDraft) {
    exception.apply_draft(draft);
    exception.rule = RecurrenceRule::none();
}

/// The rule a split-off series continues with after `consumed` occurrences.
fn remaining_rule(rule: &RecurrenceRule, consumed: usize) -> RecurrenceRule {
    let mut rule = rule.clone();
    if let Until::Count(total) = rule.until {
        let consumed = u32::try_from(consumed).unwrap_or(u32::MAX);
        rule.until = Until::Count(total.saturating_sub(consumed).max(1));
    }
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_remaining_rule_subtracts_consumed_count() {
        let rule = RecurrenceRule::weekly(1, [Weekday::Mon]).with_until(Until::Count(10));
        assert_eq!(remaining_rule(&rule, 3).until, Until::Count(7));
        assert_eq!(remaining_rule(&rule, 12).until, Until::Count(1));
    }

    #[test]
    fn test_remaining_rule_keeps_open_ranges() {
        let rule = RecurrenceRule::daily(2);
        assert_eq!(remaining_rule(&rule, 5), rule);
    }

    #[test]
    fn test_exceptions_never_recur() {
        let mut exception = EventRecord::new(
            1,
            "x",
            TimeValue::Date(chrono::NaiveDate::MIN),
            TimeValue::Date(chrono::NaiveDate::MIN),
        );
        let occurrence = Occurrence::from(Record::Original(exception.clone()));
        let draft = EventDraft::from_occurrence(&occurrence).with_rule(RecurrenceRule::daily(1));
        apply_to_exception(&mut exception, &draft);
        assert!(!exception.rule.is_recurring());
    }
}
