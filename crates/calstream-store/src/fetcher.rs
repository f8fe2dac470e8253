//! Paged, double-buffered cursor over one query's results.

use std::collections::VecDeque;
use std::sync::Arc;

use calstream_core::record::Occurrence;

use crate::filter::Query;
use crate::store::RecordStore;

/// Pages kept materialized at once: the current block and one prefetched block.
const MAX_BUFFERED_BLOCKS: usize = 2;

type Block = VecDeque<Occurrence>;

/// ## Summary
/// Presents a single forward cursor over a query while reading the store
/// in fixed-size pages.
///
/// A page shorter than the page size signals exhaustion. Store failures
/// are logged and end the stream early; malformed records are skipped.
pub struct BlockFetcher {
    store: Arc<dyn RecordStore>,
    query: Query,
    page_size: usize,
    offset: usize,
    /// Non-empty blocks, current first.
    blocks: VecDeque<Block>,
    no_more_to_fetch: bool,
    no_more_to_give: bool,
    page_reads: usize,
}

impl std::fmt::Debug for BlockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFetcher")
            .field("query", &self.query)
            .field("page_size", &self.page_size)
            .field("offset", &self.offset)
            .field("buffered_blocks", &self.blocks.len())
            .field("no_more_to_fetch", &self.no_more_to_fetch)
            .field("no_more_to_give", &self.no_more_to_give)
            .finish_non_exhaustive()
    }
}

impl BlockFetcher {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, query: Query, page_size: usize) -> Self {
        debug_assert!(page_size > 0, "page size must be positive");
        Self {
            store,
            query,
            page_size: page_size.max(1),
            offset: 0,
            blocks: VecDeque::with_capacity(MAX_BUFFERED_BLOCKS),
            no_more_to_fetch: false,
            no_more_to_give: false,
            page_reads: 0,
        }
    }

    /// ## Summary
    /// Loads the current block and, with `fill_both`, the next one.
    ///
    /// Safe to call speculatively before consumption starts.
    pub fn prefetch(&mut self, fill_both: bool) {
        let wanted = if fill_both { MAX_BUFFERED_BLOCKS } else { 1 };
        while self.blocks.len() < wanted && !self.no_more_to_fetch {
            if let Some(block) = self.fetch_block() {
                self.blocks.push_back(block);
            }
        }
    }

    /// ## Summary
    /// Removes and returns the next well-formed occurrence.
    ///
    /// When the buffered blocks run dry and `auto_fetch` is set, the next
    /// page is read synchronously. Without `auto_fetch` an empty buffer ends
    /// the fetcher. Once exhausted, returns `None` permanently.
    pub fn next(&mut self, auto_fetch: bool) -> Option<Occurrence> {
        while !self.no_more_to_give {
            if let Some(block) = self.blocks.front_mut() {
                let candidate = block.pop_front();
                if block.is_empty() {
                    self.blocks.pop_front();
                }
                match candidate {
                    Some(occurrence) if occurrence.is_well_formed() => return Some(occurrence),
                    Some(occurrence) => {
                        tracing::debug!(
                            event_id = occurrence.event_id,
                            start = %occurrence.start,
                            end = %occurrence.end,
                            "Dropping malformed record"
                        );
                    }
                    None => {}
                }
                continue;
            }

            if self.no_more_to_fetch || !auto_fetch {
                self.no_more_to_give = true;
            } else if let Some(block) = self.fetch_block() {
                self.blocks.push_back(block);
            } else {
                // Empty or failed page; `fetch_block` has flagged exhaustion.
            }
        }
        None
    }

    /// True once exhaustion is detected and every buffered record is consumed.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.no_more_to_give || (self.no_more_to_fetch && self.blocks.is_empty())
    }

    /// Number of page reads issued against the store so far.
    #[must_use]
    pub const fn page_reads(&self) -> usize {
        self.page_reads
    }

    fn fetch_block(&mut self) -> Option<Block> {
        if self.no_more_to_fetch {
            return None;
        }
        debug_assert!(self.blocks.len() < MAX_BUFFERED_BLOCKS);

        self.page_reads += 1;
        match self.store.fetch(&self.query, self.offset, self.page_size) {
            Ok(records) => {
                let len = records.len();
                if len < self.page_size {
                    self.no_more_to_fetch = true;
                }
                tracing::trace!(
                    offset = self.offset,
                    len,
                    exhausted = self.no_more_to_fetch,
                    "Fetched block"
                );
                self.offset += len;
                (len > 0).then(|| records.into_iter().map(Occurrence::from).collect())
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    offset = self.offset,
                    flavor = ?self.query.flavor,
                    "Block fetch failed, treating query as exhausted"
                );
                self.no_more_to_fetch = true;
                None
            }
        }
    }
}
