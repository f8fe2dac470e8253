//! Per-category occurrence streams.

mod complex;
mod simple;

pub use complex::ComplexStream;
pub use simple::SimpleStream;

use calstream_core::record::Occurrence;
use calstream_core::types::Category;
use chrono::NaiveDate;

/// ## Summary
/// A single-direction stream of one category of occurrences.
///
/// Streams are consumed from one logical thread; `prefetch` may run ahead
/// of consumption (e.g. on a blocking task) before the first read.
pub trait InstanceStream: Send {
    fn category(&self) -> Category;

    /// Warms the underlying block buffers.
    fn prefetch(&mut self, fill_both: bool);

    /// The occurrence the stream is positioned on, if any.
    fn current(&mut self) -> Option<&Occurrence>;

    /// The calendar day the current occurrence is shown on.
    fn current_date(&mut self) -> Option<NaiveDate>;

    /// Moves past the current occurrence.
    fn advance(&mut self);

    fn eof(&mut self) -> bool {
        self.current().is_none()
    }
}
