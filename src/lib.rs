//! Programme schedule harvesting and gap-free guide timelines.
//!
//! The write side ([`ingestor`]) pulls per-channel schedules from a provider
//! with staggered dispatch and bounded batch retries, normalizes them and hands
//! them to a [`storage::ScheduleStore`]. The read side ([`timeline`]) turns the
//! stored records for a window into contiguous per-channel timelines.

pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod sources;
pub mod storage;
pub mod timeline;
pub mod utils;
