//! Day-by-day stream that repeats multi-day occurrences on every day they span.

use std::cmp::Ordering;
use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::record::Occurrence;
use calstream_core::time::day_start;
use calstream_core::types::{Category, Direction};
use calstream_store::BlockFetcher;
use chrono::{NaiveDate, TimeDelta};

use super::InstanceStream;

/// An occurrence that is still visible on upcoming days of the scan.
#[derive(Debug, Clone)]
struct Occupant {
    occurrence: Occurrence,
    /// Days left to hand out, counting the current one. Always > 0 while live.
    remaining_days: u32,
}

/// ## Summary
/// Agenda stream over one category.
///
/// Keeps the occupants visible on the current day plus one pending
/// occurrence read ahead of them. Each day, occupants are ordered by
/// (effective start, summary) in scan direction and handed out once.
#[derive(Debug)]
pub struct ComplexStream {
    fetcher: BlockFetcher,
    env: Arc<Environment>,
    category: Category,
    direction: Direction,
    day: NaiveDate,
    live: Vec<Occupant>,
    /// Index of the occupant handed out next on `day`.
    cursor: usize,
    pending: Option<Occurrence>,
    started: bool,
    finished: bool,
}

impl ComplexStream {
    #[must_use]
    pub const fn new(
        fetcher: BlockFetcher,
        env: Arc<Environment>,
        category: Category,
        direction: Direction,
        anchor: NaiveDate,
    ) -> Self {
        Self {
            fetcher,
            env,
            category,
            direction,
            day: anchor,
            live: Vec::new(),
            cursor: 0,
            pending: None,
            started: false,
            finished: false,
        }
    }

    fn ensure_started(&mut self) {
        if !self.started {
            self.started = true;
            self.day = self.env.clamp_to_bounds(self.day);
            self.pending = self.fetcher.next(true);
            self.begin_day();
        }
    }

    /// Day on which `occurrence` enters the live set.
    fn anchor_of(&self, occurrence: &Occurrence) -> NaiveDate {
        let tz = self.env.timezone;
        match self.direction {
            Direction::Forward => self.day.max(occurrence.first_day(tz)),
            Direction::Backward => self.day.min(occurrence.last_day(tz)),
        }
    }

    /// Inclusive count of days the occurrence is visible from `day` onward.
    /// Returns true if a scan reaching `day` has left the supported range.
    fn beyond_range(&self, day: NaiveDate) -> bool {
        match self.direction {
            Direction::Forward => day > self.env.upper_bound,
            Direction::Backward => day < self.env.lower_bound,
        }
    }

    fn remaining_span(&self, occurrence: &Occurrence) -> i64 {
        let tz = self.env.timezone;
        let days = match self.direction {
            Direction::Forward => occurrence.last_day(tz).signed_duration_since(self.day),
            Direction::Backward => self.day.signed_duration_since(occurrence.first_day(tz)),
        };
        days.num_days() + 1
    }

    fn sort_live(&mut self) {
        let tz = self.env.timezone;
        let day_begin = day_start(self.day, tz);
        let direction = self.direction;
        self.live.sort_by(|a, b| {
            let key = |occupant: &Occupant| occupant.occurrence.start.to_utc(tz).max(day_begin);
            let ordering = key(a)
                .cmp(&key(b))
                .then_with(|| a.occurrence.summary.cmp(&b.occurrence.summary));
            direction.sort_order().apply(ordering)
        });
    }

    /// Materializes `day`: jumps over empty days, pulls every pending
    /// occurrence anchored on it and orders the live set.
    ///
    /// Occurrences entirely outside the supported range are dropped.
    fn begin_day(&mut self) {
        loop {
            if self.live.is_empty() {
                let Some(next) = self.pending.as_ref() else {
                    self.finish();
                    return;
                };
                let anchor = self.anchor_of(next);
                if self.beyond_range(anchor) {
                    tracing::trace!(
                        event_id = next.event_id,
                        day = %anchor,
                        "Skipping occurrence outside the supported calendar range"
                    );
                    self.pending = self.fetcher.next(true);
                    continue;
                }
                self.day = self.env.clamp_to_bounds(anchor);
            }

            if !self.env.in_bounds(self.day) {
                tracing::trace!(day = %self.day, "Scan left the supported calendar range");
                self.finish();
                return;
            }

            while let Some(occurrence) = self.pending.take() {
                if self.anchor_of(&occurrence) != self.day {
                    self.pending = Some(occurrence);
                    break;
                }
                let span = self.remaining_span(&occurrence);
                if span > 0 {
                    self.live.push(Occupant {
                        occurrence,
                        remaining_days: u32::try_from(span).unwrap_or(u32::MAX),
                    });
                } else {
                    tracing::trace!(
                        event_id = occurrence.event_id,
                        day = %self.day,
                        "Skipping occurrence with no visible span"
                    );
                }
                self.pending = self.fetcher.next(true);
            }

            if !self.live.is_empty() {
                self.sort_live();
                self.cursor = 0;
                return;
            }
        }
    }

    fn end_day(&mut self) {
        self.live.retain(|occupant| occupant.remaining_days > 0);
        match self
            .day
            .checked_add_signed(TimeDelta::days(self.direction.step()))
        {
            Some(day) => self.day = day,
            None => {
                self.finish();
                return;
            }
        }
        self.begin_day();
    }

    fn finish(&mut self) {
        self.finished = true;
        self.live.clear();
        self.pending = None;
    }
}

impl InstanceStream for ComplexStream {
    fn category(&self) -> Category {
        self.category
    }

    fn prefetch(&mut self, fill_both: bool) {
        self.fetcher.prefetch(fill_both);
    }

    fn current(&mut self) -> Option<&Occurrence> {
        self.ensure_started();
        if self.finished {
            return None;
        }
        self.live.get(self.cursor).map(|occupant| &occupant.occurrence)
    }

    fn current_date(&mut self) -> Option<NaiveDate> {
        self.ensure_started();
        (!self.finished).then_some(self.day)
    }

    fn advance(&mut self) {
        self.ensure_started();
        if self.finished {
            return;
        }
        let Some(occupant) = self.live.get_mut(self.cursor) else {
            self.end_day();
            return;
        };
        occupant.remaining_days = occupant.remaining_days.saturating_sub(1);
        self.cursor += 1;
        if self.cursor >= self.live.len() {
            self.end_day();
        }
    }
}
