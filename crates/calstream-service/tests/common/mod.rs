#![allow(dead_code, clippy::unwrap_used)]
//! Shared fixtures for service integration tests.
//!
//! Every test builds its own [`MemoryStore`]; nothing is shared between
//! tests, so they can run in parallel.

use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::record::{EventRecord, Field, Occurrence, RecordFlavor};
use calstream_core::time::TimeValue;
use calstream_core::types::SortOrder;
use calstream_service::model::{ListEntry, NextItem};
use calstream_store::{MemoryStore, Query, RecordStore};
use chrono::{NaiveDate, TimeZone, Utc};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> TimeValue {
    TimeValue::Utc(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
}

pub fn all_day(book_id: i64, summary: &str, from: NaiveDate, to: NaiveDate) -> EventRecord {
    EventRecord::new(book_id, summary, TimeValue::Date(from), TimeValue::Date(to))
}

/// Small pages so that multi-page fetching is exercised.
pub fn env() -> Environment {
    Environment::default().with_page_size(3)
}

pub fn store_with(events: impl IntoIterator<Item = EventRecord>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_events(events).unwrap())
}

/// Every timed occurrence in the store, ascending by start.
pub fn timed_occurrences(store: &MemoryStore) -> Vec<Occurrence> {
    occurrences(store, RecordFlavor::TimedInstance)
}

pub fn all_day_occurrences(store: &MemoryStore) -> Vec<Occurrence> {
    occurrences(store, RecordFlavor::AllDayInstance)
}

fn occurrences(store: &MemoryStore, flavor: RecordFlavor) -> Vec<Occurrence> {
    let query = Query::new(flavor)
        .sort_by(Field::Start, SortOrder::Ascending)
        .sort_by(Field::EventId, SortOrder::Ascending);
    let total = store.count(&query).unwrap();
    store
        .fetch(&query, 0, total)
        .unwrap()
        .into_iter()
        .map(Occurrence::from)
        .collect()
}

/// The occurrence starting at `start`.
pub fn occurrence_at(store: &MemoryStore, start: TimeValue) -> Occurrence {
    timed_occurrences(store)
        .into_iter()
        .chain(all_day_occurrences(store))
        .find(|occurrence| occurrence.start == start)
        .unwrap()
}

/// `(date, summary, day_changed)` triples of merged items.
pub fn summarize(items: impl IntoIterator<Item = NextItem>) -> Vec<(NaiveDate, String, bool)> {
    items
        .into_iter()
        .map(|item| (item.date, item.occurrence.summary, item.day_changed))
        .collect()
}

pub fn describe(entry: ListEntry) -> String {
    match entry {
        ListEntry::Occurrence(item) => format!("{} {}", item.date, item.occurrence.summary),
        ListEntry::EmptyMonth(month) => format!("{month} empty"),
    }
}
