//! Occurrence streaming and recurring-event edit scopes.

pub mod error;
pub mod model;
pub mod recurrence;
pub mod stream;
