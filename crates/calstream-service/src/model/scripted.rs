//! Instance stream replaying a fixed script, for model tests.

use std::collections::VecDeque;

use calstream_core::record::{EventRecord, Occurrence, Record};
use calstream_core::time::TimeValue;
use calstream_core::types::Category;
use chrono::NaiveDate;

use crate::stream::InstanceStream;

/// Replays a fixed `(date, summary)` script as all-day occurrences.
pub(super) struct ScriptedStream {
    category: Category,
    script: VecDeque<(NaiveDate, Occurrence)>,
}

impl ScriptedStream {
    pub(super) fn boxed(category: Category, days: &[(NaiveDate, &str)]) -> Box<dyn InstanceStream> {
        let script = days
            .iter()
            .map(|(date, summary)| {
                let day = TimeValue::Date(*date);
                let event = EventRecord::new(1, *summary, day, day);
                (*date, Occurrence::from(Record::Original(event)))
            })
            .collect();
        Box::new(Self { category, script })
    }
}

impl InstanceStream for ScriptedStream {
    fn category(&self) -> Category {
        self.category
    }

    fn prefetch(&mut self, _fill_both: bool) {}

    fn current(&mut self) -> Option<&Occurrence> {
        self.script.front().map(|(_, occurrence)| occurrence)
    }

    fn current_date(&mut self) -> Option<NaiveDate> {
        self.script.front().map(|(date, _)| *date)
    }

    fn advance(&mut self) {
        self.script.pop_front();
    }
}
