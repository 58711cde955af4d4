//! Structured event names and field helpers used by every `tracing` call in the crate.

pub mod events;
pub mod fields;
