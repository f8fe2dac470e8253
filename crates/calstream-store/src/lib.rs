//! Record store contract, query model and paged block fetching.

pub mod builder;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod memory;
pub mod store;

pub use builder::QueryBuilder;
pub use fetcher::BlockFetcher;
pub use filter::{CompareOp, Filter, Query, SortKey};
pub use memory::MemoryStore;
pub use store::RecordStore;
