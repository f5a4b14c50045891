//! JSON-file backed stores
//!
//! Each store owns one file. Writes go to a sibling `.tmp` file which is then
//! renamed over the target, so a crash never leaves a half-written file.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::memory::ScheduleTable;
use super::traits::{ChannelDirectory, RunMarkerStore, ScheduleQuery, ScheduleStore};
use crate::errors::{StorageError, StorageResult};
use crate::models::{Channel, NormalizedSchedule, RunMarker};

async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path.display().to_string(), e)),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let io_err = |e| StorageError::io(path.display().to_string(), e);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }

    let contents = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

/// Schedule store persisted as a JSON array, loaded fully into memory on open
pub struct JsonFileScheduleStore {
    path: PathBuf,
    table: RwLock<ScheduleTable>,
}

impl JsonFileScheduleStore {
    pub async fn open<P: Into<PathBuf>>(path: P) -> StorageResult<Self> {
        let path = path.into();
        let records: Vec<NormalizedSchedule> = read_json(&path).await?.unwrap_or_default();
        info!("Loaded {} stored schedules from {}", records.len(), path.display());
        Ok(Self {
            path,
            table: RwLock::new(ScheduleTable::from_records(records)),
        })
    }
}

#[async_trait]
impl ScheduleStore for JsonFileScheduleStore {
    async fn store_schedules(&self, schedules: Vec<NormalizedSchedule>) -> StorageResult<usize> {
        let mut table = self.table.write().await;
        let mut updated = table.clone();
        let written = updated.upsert(schedules);
        if written > 0 {
            write_json(&self.path, &updated.snapshot()).await?;
            *table = updated;
        }
        debug!("Stored {} schedules to {}", written, self.path.display());
        Ok(written)
    }

    async fn find_schedules(&self, query: &ScheduleQuery) -> StorageResult<Vec<NormalizedSchedule>> {
        Ok(self.table.read().await.find(query))
    }

    async fn delete_within_range(&self, from_day: NaiveDate, to_day: NaiveDate) -> StorageResult<usize> {
        let mut table = self.table.write().await;
        let mut updated = table.clone();
        let deleted = updated.delete_within_range(from_day, to_day);
        if deleted > 0 {
            write_json(&self.path, &updated.snapshot()).await?;
            *table = updated;
        }
        Ok(deleted)
    }
}

/// Channel list read from a JSON array of `{id, title, logo}` on every call
#[derive(Debug, Clone)]
pub struct JsonFileChannelDirectory {
    path: PathBuf,
}

impl JsonFileChannelDirectory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ChannelDirectory for JsonFileChannelDirectory {
    async fn list_channels(&self) -> StorageResult<Vec<Channel>> {
        match read_json::<Vec<Channel>>(&self.path).await? {
            Some(channels) => Ok(channels),
            None => {
                warn!("Channel file {} does not exist", self.path.display());
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileRunMarkerStore {
    path: PathBuf,
}

impl JsonFileRunMarkerStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RunMarkerStore for JsonFileRunMarkerStore {
    async fn load(&self) -> StorageResult<RunMarker> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, marker: &RunMarker) -> StorageResult<()> {
        write_json(&self.path, marker).await
    }
}
