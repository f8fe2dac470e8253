//! Merging of per-category streams into one ordered occurrence sequence.

mod factory;
mod month;
#[cfg(test)]
mod scripted;

pub use factory::{ModelFactory, prepare};
pub use month::{ListEntry, MonthGroupedModel};

use calstream_core::record::Occurrence;
use calstream_core::types::Direction;
use chrono::NaiveDate;

use crate::stream::InstanceStream;

/// One merged occurrence together with the day it is shown on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextItem {
    pub occurrence: Occurrence,
    pub date: NaiveDate,
    /// True when `date` differs from the previously returned item's date.
    pub day_changed: bool,
}

/// ## Summary
/// Merges N instance streams into one chronological sequence.
///
/// Each step picks the stream whose current date comes first in scan
/// direction. Ties go to the stream registered first, so all-day streams
/// registered before timed ones win on equal days.
pub struct ListModel {
    streams: Vec<Box<dyn InstanceStream>>,
    direction: Direction,
    last_date: Option<NaiveDate>,
}

impl std::fmt::Debug for ListModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListModel")
            .field("streams", &self.streams.len())
            .field("direction", &self.direction)
            .field("last_date", &self.last_date)
            .finish()
    }
}

impl ListModel {
    #[must_use]
    pub const fn new(direction: Direction) -> Self {
        Self {
            streams: Vec::new(),
            direction,
            last_date: None,
        }
    }

    /// Registers a stream; registration order breaks date ties.
    #[must_use]
    pub fn with_stream(mut self, stream: Box<dyn InstanceStream>) -> Self {
        self.streams.push(stream);
        self
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Warms every owned stream.
    pub fn prefetch(&mut self, fill_both: bool) {
        for stream in &mut self.streams {
            stream.prefetch(fill_both);
        }
    }

    /// True iff every owned stream is exhausted.
    pub fn eof(&mut self) -> bool {
        self.streams.iter_mut().all(|stream| stream.eof())
    }

    fn select(&mut self) -> Option<(usize, NaiveDate)> {
        let direction = self.direction;
        let mut best: Option<(usize, NaiveDate)> = None;
        for (index, stream) in self.streams.iter_mut().enumerate() {
            let Some(date) = stream.current_date() else {
                continue;
            };
            let better = best.is_none_or(|(_, best_date)| match direction {
                Direction::Forward => date < best_date,
                Direction::Backward => date > best_date,
            });
            if better {
                best = Some((index, date));
            }
        }
        best
    }
}

impl Iterator for ListModel {
    type Item = NextItem;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, date) = self.select()?;
        let stream = &mut self.streams[index];
        let occurrence = stream.current()?.clone();
        stream.advance();

        let day_changed = self.last_date != Some(date);
        self.last_date = Some(date);
        tracing::trace!(
            event_id = occurrence.event_id,
            %date,
            category = %stream.category(),
            day_changed,
            "Merged occurrence"
        );
        Some(NextItem {
            occurrence,
            date,
            day_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedStream;
    use super::*;
    use calstream_core::types::Category;
    use chrono::Datelike;

    fn may(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn merged(model: ListModel) -> Vec<(u32, String, bool)> {
        model
            .map(|item| (item.date.day(), item.occurrence.summary, item.day_changed))
            .collect()
    }

    #[test]
    fn test_forward_merge_breaks_ties_by_registration() {
        let all_day = [(may(2), "holiday"), (may(4), "trip")];
        let timed = [(may(1), "call"), (may(2), "lunch"), (may(4), "gym")];
        let model = ListModel::new(Direction::Forward)
            .with_stream(ScriptedStream::boxed(Category::AllDay, &all_day))
            .with_stream(ScriptedStream::boxed(Category::Timed, &timed));

        assert_eq!(
            merged(model),
            vec![
                (1, "call".to_string(), true),
                (2, "holiday".to_string(), true),
                (2, "lunch".to_string(), false),
                (4, "trip".to_string(), true),
                (4, "gym".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_backward_merge_prefers_latest_date() {
        let timed = [(may(5), "b"), (may(3), "c"), (may(1), "d")];
        let model = ListModel::new(Direction::Backward)
            .with_stream(ScriptedStream::boxed(Category::AllDay, &[(may(3), "a")]))
            .with_stream(ScriptedStream::boxed(Category::Timed, &timed));

        let days: Vec<_> = merged(model)
            .into_iter()
            .map(|(day, summary, _)| (day, summary))
            .collect();
        assert_eq!(
            days,
            vec![
                (5, "b".to_string()),
                (3, "a".to_string()),
                (3, "c".to_string()),
                (1, "d".to_string()),
            ]
        );
    }

    #[test]
    fn test_eof_requires_every_stream_drained() {
        let mut model = ListModel::new(Direction::Forward)
            .with_stream(ScriptedStream::boxed(Category::AllDay, &[]))
            .with_stream(ScriptedStream::boxed(Category::Timed, &[(may(1), "only")]));

        assert!(!model.eof());
        assert!(model.next().is_some());
        assert!(model.eof());
        assert!(model.next().is_none());
    }
}
