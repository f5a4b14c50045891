//! Persistence for schedules, channels and the first-run marker
//!
//! The ingestion and guide layers depend only on the traits in [`traits`];
//! [`memory`] backs tests and embedding, [`file`] backs the binary.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::{JsonFileChannelDirectory, JsonFileRunMarkerStore, JsonFileScheduleStore};
pub use memory::{MemoryRunMarkerStore, MemoryScheduleStore, StaticChannelDirectory};
pub use traits::{ALL_CATEGORIES, ChannelDirectory, RunMarkerStore, ScheduleQuery, ScheduleStore};
