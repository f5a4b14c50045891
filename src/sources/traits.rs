//! Schedule provider trait definitions
//!
//! The ingestion cycle only ever talks to a provider through
//! [`ScheduleProvider`], so tests can swap in scripted providers and the HTTP
//! client can be replaced without touching the cycle.

use async_trait::async_trait;

use crate::errors::SourceResult;
use crate::models::{FetchWindow, RawScheduleEntry};

/// Fetches one channel's raw schedule for a window
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Fetch the raw schedule entries for `channel_id` within `window`.
    ///
    /// Every failure is per-channel; callers decide whether to retry.
    async fn fetch_schedule(
        &self,
        channel_id: &str,
        window: &FetchWindow,
    ) -> SourceResult<Vec<RawScheduleEntry>>;
}
