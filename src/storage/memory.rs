//! In-memory stores

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::traits::{ChannelDirectory, RunMarkerStore, ScheduleQuery, ScheduleStore};
use crate::errors::StorageResult;
use crate::models::{Channel, NormalizedSchedule, RunMarker};

/// Schedule records keyed by schedule id. Shared by the memory and file stores.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScheduleTable {
    records: HashMap<String, NormalizedSchedule>,
}

impl ScheduleTable {
    pub(crate) fn from_records(records: Vec<NormalizedSchedule>) -> Self {
        let mut table = Self::default();
        table.upsert(records);
        table
    }

    pub(crate) fn upsert(&mut self, schedules: Vec<NormalizedSchedule>) -> usize {
        let mut written = 0;
        for schedule in schedules {
            if self.records.get(&schedule.schedule_id) != Some(&schedule) {
                written += 1;
            }
            self.records.insert(schedule.schedule_id.clone(), schedule);
        }
        written
    }

    pub(crate) fn find(&self, query: &ScheduleQuery) -> Vec<NormalizedSchedule> {
        let mut found: Vec<NormalizedSchedule> = self
            .records
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        sort_records(&mut found);
        found
    }

    pub(crate) fn delete_within_range(&mut self, from_day: NaiveDate, to_day: NaiveDate) -> usize {
        let (from, to) = day_range_bounds(from_day, to_day);
        let before = self.records.len();
        self.records
            .retain(|_, s| s.start_date < from || s.start_date > to);
        before - self.records.len()
    }

    /// All records in stable order, for persistence
    pub(crate) fn snapshot(&self) -> Vec<NormalizedSchedule> {
        let mut all: Vec<NormalizedSchedule> = self.records.values().cloned().collect();
        sort_records(&mut all);
        all
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

fn sort_records(records: &mut [NormalizedSchedule]) {
    records.sort_by(|a, b| {
        a.channel_id
            .cmp(&b.channel_id)
            .then(a.start_date.cmp(&b.start_date))
            .then(a.schedule_id.cmp(&b.schedule_id))
    });
}

/// `[from_day 00:00:00, to_day 23:59:59]` in UTC
pub(crate) fn day_range_bounds(from_day: NaiveDate, to_day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (
        from_day.and_time(NaiveTime::MIN).and_utc(),
        to_day.and_time(last_second).and_utc(),
    )
}

#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    table: RwLock<ScheduleTable>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn store_schedules(&self, schedules: Vec<NormalizedSchedule>) -> StorageResult<usize> {
        Ok(self.table.write().await.upsert(schedules))
    }

    async fn find_schedules(&self, query: &ScheduleQuery) -> StorageResult<Vec<NormalizedSchedule>> {
        Ok(self.table.read().await.find(query))
    }

    async fn delete_within_range(&self, from_day: NaiveDate, to_day: NaiveDate) -> StorageResult<usize> {
        Ok(self.table.write().await.delete_within_range(from_day, to_day))
    }
}

/// Fixed channel list
#[derive(Debug, Clone, Default)]
pub struct StaticChannelDirectory {
    channels: Vec<Channel>,
}

impl StaticChannelDirectory {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl ChannelDirectory for StaticChannelDirectory {
    async fn list_channels(&self) -> StorageResult<Vec<Channel>> {
        Ok(self.channels.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunMarkerStore {
    marker: RwLock<Option<RunMarker>>,
}

impl MemoryRunMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(marker: RunMarker) -> Self {
        Self {
            marker: RwLock::new(Some(marker)),
        }
    }
}

#[async_trait]
impl RunMarkerStore for MemoryRunMarkerStore {
    async fn load(&self) -> StorageResult<RunMarker> {
        Ok(self.marker.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, marker: &RunMarker) -> StorageResult<()> {
        *self.marker.write().await = Some(marker.clone());
        Ok(())
    }
}
