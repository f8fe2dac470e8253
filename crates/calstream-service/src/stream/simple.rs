use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::record::Occurrence;
use calstream_core::types::Category;
use calstream_store::BlockFetcher;
use chrono::NaiveDate;

use super::InstanceStream;

/// ## Summary
/// Yields each occurrence once, on its start date.
///
/// Used for keyword search and range listings where multi-day stacking
/// does not matter.
#[derive(Debug)]
pub struct SimpleStream {
    fetcher: BlockFetcher,
    env: Arc<Environment>,
    category: Category,
    current: Option<Occurrence>,
    started: bool,
}

impl SimpleStream {
    #[must_use]
    pub const fn new(fetcher: BlockFetcher, env: Arc<Environment>, category: Category) -> Self {
        Self {
            fetcher,
            env,
            category,
            current: None,
            started: false,
        }
    }

    fn pull(&mut self) {
        self.current = loop {
            let Some(occurrence) = self.fetcher.next(true) else {
                break None;
            };
            let day = occurrence.first_day(self.env.timezone);
            if self.env.in_bounds(day) {
                break Some(occurrence);
            }
            tracing::trace!(
                event_id = occurrence.event_id,
                %day,
                "Skipping out-of-range occurrence"
            );
        };
    }

    fn ensure_started(&mut self) {
        if !self.started {
            self.started = true;
            self.pull();
        }
    }
}

impl InstanceStream for SimpleStream {
    fn category(&self) -> Category {
        self.category
    }

    fn prefetch(&mut self, fill_both: bool) {
        self.fetcher.prefetch(fill_both);
    }

    fn current(&mut self) -> Option<&Occurrence> {
        self.ensure_started();
        self.current.as_ref()
    }

    fn current_date(&mut self) -> Option<NaiveDate> {
        let tz = self.env.timezone;
        self.current().map(|occurrence| occurrence.first_day(tz))
    }

    fn advance(&mut self) {
        self.ensure_started();
        if self.current.is_some() {
            self.pull();
        }
    }
}
