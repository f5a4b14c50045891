//! Storage seams used by the harvest job and the guide service

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::StorageResult;
use crate::models::{Channel, NormalizedSchedule, RunMarker};

/// Category code meaning "no category filter"
pub const ALL_CATEGORIES: &str = "all";

/// Read-side filter for stored schedules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    /// Records overlapping `[start, end)` match
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `None` matches every channel
    pub channel_ids: Option<Vec<String>>,
    /// `None` or `"all"` matches every category
    pub category: Option<String>,
}

impl ScheduleQuery {
    pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            channel_ids: None,
            category: None,
        }
    }

    pub fn with_channels(mut self, channel_ids: Vec<String>) -> Self {
        self.channel_ids = Some(channel_ids);
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn matches(&self, schedule: &NormalizedSchedule) -> bool {
        if schedule.start_date >= self.end || schedule.end_date <= self.start {
            return false;
        }
        if let Some(ids) = &self.channel_ids {
            if !ids.iter().any(|id| *id == schedule.channel_id) {
                return false;
            }
        }
        match self.category.as_deref() {
            None | Some(ALL_CATEGORIES) => true,
            Some(code) => schedule.has_category(code),
        }
    }
}

/// Persisted normalized schedules
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Upsert by schedule id; returns how many records were inserted or changed.
    /// Storing the same batch twice leaves one copy of each record.
    async fn store_schedules(&self, schedules: Vec<NormalizedSchedule>) -> StorageResult<usize>;

    /// Matching records ordered by channel, start date and schedule id
    async fn find_schedules(&self, query: &ScheduleQuery) -> StorageResult<Vec<NormalizedSchedule>>;

    /// Delete records whose start lies in `[from_day 00:00:00, to_day 23:59:59]` UTC
    async fn delete_within_range(&self, from_day: NaiveDate, to_day: NaiveDate) -> StorageResult<usize>;
}

/// Channel master data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn list_channels(&self) -> StorageResult<Vec<Channel>>;
}

/// First-run marker persistence. An absent marker loads as the default,
/// which still has the first run pending.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunMarkerStore: Send + Sync {
    async fn load(&self) -> StorageResult<RunMarker>;
    async fn save(&self, marker: &RunMarker) -> StorageResult<()>;
}
