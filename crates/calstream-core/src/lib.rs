//! Core types shared by the calendar instance streaming engine.
//!
//! Everything here is free of storage concerns: typed time values,
//! exception keys, recurrence rules, record shapes and the injected
//! [`env::Environment`].

pub mod config;
pub mod constants;
pub mod env;
pub mod error;
pub mod record;
pub mod recurrence;
pub mod time;
pub mod types;
