//! In-memory record store.
//!
//! Generates the instance views by expanding each original event's
//! recurrence rule with the `rrule` crate. Expansion happens in UTC and is
//! capped per event, which is enough for fixtures and local tooling.
//! Date-bound rules end at the close of their last day in the store's
//! timezone.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use calstream_core::constants::CALENDAR_UPPER_BOUND;
use calstream_core::record::{EventRecord, InstanceRecord, Record, RecordFlavor};
use calstream_core::time::{TimeValue, day_start};
use chrono::{Datelike, NaiveDate, TimeDelta, Utc, Weekday};
use chrono_tz::Tz as ChronoTz;
use rrule::{RRule, RRuleSet, Tz, Unvalidated};

use crate::error::{StoreError, StoreResult};
use crate::filter::Query;
use crate::store::RecordStore;

/// Upper bound on generated instances per recurring event.
const EXPANSION_LIMIT: u16 = 4096;

#[derive(Debug, Default)]
struct MemoryState {
    events: BTreeMap<i64, EventRecord>,
    last_id: i64,
}

#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    week_start: Weekday,
    timezone: ChronoTz,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            week_start: Weekday::Mon,
            timezone: ChronoTz::UTC,
        }
    }

    #[must_use]
    pub const fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    /// Sets the timezone whose day boundaries close date-bound rules.
    #[must_use]
    pub const fn with_timezone(mut self, timezone: ChronoTz) -> Self {
        self.timezone = timezone;
        self
    }

    /// `UNTIL` value covering every occurrence on `until`.
    ///
    /// All-day series expand from floating midnights, so the UTC end of day
    /// applies. Timed series close at the end of the local day.
    fn until_value(&self, until: NaiveDate, all_day: bool) -> String {
        if all_day {
            return format!("{}T235959Z", until.format("%Y%m%d"));
        }
        let next_day = until.succ_opt().unwrap_or(until);
        let close = day_start(next_day, self.timezone) - TimeDelta::seconds(1);
        close.format("%Y%m%dT%H%M%SZ").to_string()
    }

    /// ## Summary
    /// Builds a store pre-populated with `events`; ids are reassigned.
    ///
    /// ## Errors
    /// Returns a store error if an insert fails.
    pub fn with_events(events: impl IntoIterator<Item = EventRecord>) -> StoreResult<Self> {
        let store = Self::new();
        for event in events {
            store.insert_event(event)?;
        }
        Ok(store)
    }

    /// ## Summary
    /// Snapshot of every stored event, ordered by id.
    ///
    /// ## Errors
    /// Returns [`StoreError::Backend`] if the store lock is poisoned.
    pub fn events(&self) -> StoreResult<Vec<EventRecord>> {
        Ok(self.read()?.events.values().cloned().collect())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|err| StoreError::Backend(format!("store lock poisoned: {err}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|err| StoreError::Backend(format!("store lock poisoned: {err}")))
    }

    /// Records visible in `query`'s view, filtered and sorted.
    fn select(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let mut records = Vec::new();
        for event in state.events.values() {
            match query.flavor {
                RecordFlavor::Original => records.push(Record::Original(event.clone())),
                RecordFlavor::TimedInstance | RecordFlavor::AllDayInstance => {
                    records.extend(self.expand(event)?.into_iter().map(Record::instance));
                }
            }
        }
        drop(state);

        records.retain(|record| query.matches(record));
        records.sort_by(|a, b| query.compare_records(a, b));
        Ok(records)
    }

    fn expand(&self, event: &EventRecord) -> StoreResult<Vec<InstanceRecord>> {
        let instance = |start: TimeValue, end: TimeValue| InstanceRecord {
            event_id: event.id,
            book_id: event.book_id,
            summary: event.summary.clone(),
            location: event.location.clone(),
            description: event.description.clone(),
            start,
            end,
            original_event_id: event.original_event_id,
            recurrence_id: event.recurrence_id,
            has_rule: event.rule.is_recurring(),
        };

        if !event.rule.is_recurring() || event.is_exception() {
            return Ok(vec![instance(event.start, event.end)]);
        }

        let rule_text = event.rule.to_rrule_string(
            self.week_start,
            event.start.local_date(ChronoTz::UTC).month(),
            |until: NaiveDate| self.until_value(until, event.start.is_all_day()),
        )?;
        let dt_start = event.start.to_utc(ChronoTz::UTC).with_timezone(&Tz::UTC);
        let mut rrule_set: RRuleSet = rule_text
            .parse::<RRule<Unvalidated>>()
            .map_err(|err| StoreError::InvalidRule(err.to_string()))?
            .build(dt_start)
            .map_err(|err| StoreError::InvalidRule(err.to_string()))?;

        let exdates: Vec<chrono::DateTime<Tz>> = event
            .exception_dates()?
            .iter()
            .map(|key| key.time().to_utc(ChronoTz::UTC).with_timezone(&Tz::UTC))
            .collect();
        if !exdates.is_empty() {
            rrule_set = rrule_set.set_exdates(exdates);
        }

        let horizon = day_start(
            CALENDAR_UPPER_BOUND.succ_opt().unwrap_or(CALENDAR_UPPER_BOUND),
            ChronoTz::UTC,
        );
        let result = rrule_set.before(horizon.with_timezone(&Tz::UTC)).all(EXPANSION_LIMIT);
        if result.limited {
            tracing::debug!(
                event_id = event.id,
                limit = EXPANSION_LIMIT,
                "Recurrence expansion capped"
            );
        }

        Ok(result
            .dates
            .into_iter()
            .map(|date| {
                let utc = date.with_timezone(&Utc);
                let start = if event.start.is_all_day() {
                    TimeValue::Date(utc.date_naive())
                } else {
                    TimeValue::Utc(utc)
                };
                let shift = start.since(event.start, ChronoTz::UTC);
                instance(start, event.end.shifted(shift))
            })
            .collect())
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, query: &Query, offset: usize, limit: usize) -> StoreResult<Vec<Record>> {
        Ok(self
            .select(query)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn count(&self, query: &Query) -> StoreResult<usize> {
        Ok(self.select(query)?.len())
    }

    fn get_event(&self, id: i64) -> StoreResult<EventRecord> {
        self.read()?
            .events
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn insert_event(&self, mut event: EventRecord) -> StoreResult<i64> {
        let mut state = self.write()?;
        state.last_id += 1;
        event.id = state.last_id;
        tracing::trace!(event_id = event.id, summary = %event.summary, "Inserted event");
        state.events.insert(event.id, event);
        Ok(state.last_id)
    }

    fn update_event(&self, event: &EventRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        let slot = state
            .events
            .get_mut(&event.id)
            .ok_or(StoreError::NotFound(event.id))?;
        slot.clone_from(event);
        tracing::trace!(event_id = event.id, "Updated event");
        Ok(())
    }

    fn delete_event(&self, id: i64) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.events.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        state
            .events
            .retain(|_, event| event.original_event_id != Some(id));
        tracing::trace!(event_id = id, "Deleted event and its exceptions");
        Ok(())
    }
}
