//! Contract of the external record store.

use calstream_core::record::{EventRecord, Record};

use crate::error::StoreResult;
use crate::filter::Query;

/// ## Summary
/// A queryable store of event and event-instance records.
///
/// Reads are filter + sort + offset/limit; a batch shorter than `limit`
/// means the query is exhausted. Deleting an original event removes its
/// exception records as well.
pub trait RecordStore: Send + Sync {
    /// ## Errors
    /// Returns a store error if the read fails.
    fn fetch(&self, query: &Query, offset: usize, limit: usize) -> StoreResult<Vec<Record>>;

    /// ## Errors
    /// Returns a store error if the read fails.
    fn count(&self, query: &Query) -> StoreResult<usize>;

    /// ## Errors
    /// Returns [`crate::error::StoreError::NotFound`] for an unknown id.
    fn get_event(&self, id: i64) -> StoreResult<EventRecord>;

    /// Inserts `event` and returns its assigned id.
    ///
    /// ## Errors
    /// Returns a store error if the write fails.
    fn insert_event(&self, event: EventRecord) -> StoreResult<i64>;

    /// ## Errors
    /// Returns [`crate::error::StoreError::NotFound`] for an unknown id.
    fn update_event(&self, event: &EventRecord) -> StoreResult<()>;

    /// ## Errors
    /// Returns [`crate::error::StoreError::NotFound`] for an unknown id.
    fn delete_event(&self, id: i64) -> StoreResult<()>;
}
