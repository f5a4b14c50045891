//! One complete harvest: channels in, stored schedules out

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cycle::{ChannelFailure, IngestionCycle};
use super::scheduler::ScheduledJob;
use crate::errors::{AppResult, IngestionError};
use crate::models::RunMarker;
use crate::storage::{ChannelDirectory, RunMarkerStore, ScheduleStore};
use crate::utils::time::Clock;

/// What a harvest did
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub cycle_id: Uuid,
    pub first_run: bool,
    pub channels: usize,
    pub fetched: usize,
    /// Records inserted or changed in the store
    pub stored: usize,
    pub rounds: u32,
    pub failures: Vec<ChannelFailure>,
    pub cancelled: bool,
}

pub struct HarvestJob {
    cycle: IngestionCycle,
    channels: Arc<dyn ChannelDirectory>,
    store: Arc<dyn ScheduleStore>,
    markers: Arc<dyn RunMarkerStore>,
    clock: Arc<dyn Clock>,
}

impl HarvestJob {
    pub fn new(
        cycle: IngestionCycle,
        channels: Arc<dyn ChannelDirectory>,
        store: Arc<dyn ScheduleStore>,
        markers: Arc<dyn RunMarkerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cycle,
            channels,
            store,
            markers,
            clock,
        }
    }

    /// Fetch, store, then advance the first-run marker.
    ///
    /// Everything gathered is stored even when some channels stayed unresolved;
    /// those are listed in the summary. The marker is only cleared once the
    /// store accepted the batch and the cycle was not cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> AppResult<HarvestSummary> {
        let channels = self.channels.list_channels().await?;
        if channels.is_empty() {
            return Err(IngestionError::NoChannels.into());
        }

        let marker = self.markers.load().await?;
        let first_run = marker.first_run_pending;
        info!(
            "Harvesting {} channel(s) ({})",
            channels.len(),
            if first_run { "first run" } else { "daily run" }
        );

        let report = self.cycle.run_cycle(&channels, first_run, cancel).await;
        let fetched = report.schedules.len();
        let stored = self.store.store_schedules(report.schedules).await?;
        info!("Stored {} of {} fetched schedule(s)", stored, fetched);

        if report.cancelled {
            warn!("Harvest cancelled; first-run marker left unchanged");
        } else {
            self.markers
                .save(&RunMarker {
                    first_run_pending: false,
                    last_run_at: Some(self.clock.now()),
                })
                .await?;
        }

        Ok(HarvestSummary {
            cycle_id: report.cycle_id,
            first_run,
            channels: channels.len(),
            fetched,
            stored,
            rounds: report.rounds,
            failures: report.failures,
            cancelled: report.cancelled,
        })
    }
}

#[async_trait]
impl ScheduledJob for HarvestJob {
    fn name(&self) -> &'static str {
        "schedule-harvest"
    }

    async fn execute(&self, cancel: &CancellationToken) -> AppResult<()> {
        let summary = self.run(cancel).await?;
        for failure in &summary.failures {
            error!(
                "Channel {} unresolved after {} attempt(s): {}",
                failure.channel_id, failure.attempts, failure.last_error
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryBackoff;
    use crate::errors::{AppError, SourceError, StorageError};
    use crate::ingestor::cycle::CycleSettings;
    use crate::ingestor::mapper::AssetScheduleMapper;
    use crate::models::{Channel, RawScheduleEntry};
    use crate::sources::traits::MockScheduleProvider;
    use crate::storage::traits::MockScheduleStore;
    use crate::storage::{MemoryRunMarkerStore, MemoryScheduleStore, StaticChannelDirectory};
    use crate::utils::time::ManualClock;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 8, 0, 0).unwrap()
    }

    fn settings() -> CycleSettings {
        CycleSettings {
            horizon_days: 14,
            timezone: chrono_tz::UTC,
            fetch_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            retry_gap: Duration::from_secs(1),
            retry_backoff: RetryBackoff::Fixed,
            max_retry_gap: Duration::from_secs(1),
            max_retry_rounds: 0,
        }
    }

    fn entry(id: &str) -> RawScheduleEntry {
        RawScheduleEntry {
            id: id.to_string(),
            title: "Show".to_string(),
            date_time: Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap(),
            duration: 30,
            asset: None,
        }
    }

    fn job_with(
        provider: MockScheduleProvider,
        store: Arc<dyn ScheduleStore>,
        markers: Arc<MemoryRunMarkerStore>,
        channels: Vec<Channel>,
    ) -> HarvestJob {
        let clock = Arc::new(ManualClock::new(now()));
        let cycle = IngestionCycle::new(
            Arc::new(provider),
            AssetScheduleMapper::new("placeholder"),
            clock.clone(),
            settings(),
        );
        HarvestJob::new(
            cycle,
            Arc::new(StaticChannelDirectory::new(channels)),
            store,
            markers,
            clock,
        )
    }

    #[tokio::test]
    async fn test_first_run_window_then_marker_cleared() {
        let mut provider = MockScheduleProvider::new();
        provider
            .expect_fetch_schedule()
            .withf(|channel_id, window| {
                channel_id == "c1"
                    && window.start == Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap()
                    && window.end == Utc.with_ymd_and_hms(2023, 1, 15, 0, 0, 0).unwrap()
            })
            .times(1)
            .returning(|_, _| Ok(vec![entry("s1")]));

        let store = Arc::new(MemoryScheduleStore::new());
        let markers = Arc::new(MemoryRunMarkerStore::new());
        let job = job_with(provider, store.clone(), markers.clone(), vec![Channel::new("c1", "One", "")]);

        let summary = job.run(&CancellationToken::new()).await.unwrap();
        assert!(summary.first_run);
        assert_eq!(summary.stored, 1);
        assert_eq!(store.len().await, 1);

        let marker = markers.load().await.unwrap();
        assert!(!marker.first_run_pending);
        assert_eq!(marker.last_run_at, Some(now()));
    }

    #[tokio::test]
    async fn test_marker_kept_when_store_fails() {
        let mut provider = MockScheduleProvider::new();
        provider
            .expect_fetch_schedule()
            .returning(|_, _| Ok(vec![entry("s1")]));

        let mut store = MockScheduleStore::new();
        store.expect_store_schedules().times(1).returning(|_| {
            Err(StorageError::io("schedules.json", std::io::Error::other("read-only")))
        });

        let markers = Arc::new(MemoryRunMarkerStore::new());
        let job = job_with(provider, Arc::new(store), markers.clone(), vec![Channel::new("c1", "One", "")]);

        let result = job.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(markers.load().await.unwrap().first_run_pending);
    }

    #[tokio::test]
    async fn test_exhausted_channels_are_reported_and_rest_stored() {
        let mut provider = MockScheduleProvider::new();
        provider.expect_fetch_schedule().returning(|channel_id, _| {
            if channel_id == "bad" {
                Err(SourceError::Http {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
            } else {
                Ok(vec![entry(&format!("{channel_id}-s1"))])
            }
        });

        let store = Arc::new(MemoryScheduleStore::new());
        let markers = Arc::new(MemoryRunMarkerStore::with_marker(RunMarker {
            first_run_pending: false,
            last_run_at: None,
        }));
        let job = job_with(
            provider,
            store.clone(),
            markers,
            vec![Channel::new("good", "Good", ""), Channel::new("bad", "Bad", "")],
        );

        let summary = job.run(&CancellationToken::new()).await.unwrap();
        assert!(!summary.first_run);
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].channel_id, "bad");
        assert_eq!(summary.failures[0].attempts, 1);
        assert!(summary.failures[0].last_error.contains("500"));
    }

    #[tokio::test]
    async fn test_no_channels_is_an_error() {
        let provider = MockScheduleProvider::new();
        let job = job_with(
            provider,
            Arc::new(MemoryScheduleStore::new()),
            Arc::new(MemoryRunMarkerStore::new()),
            Vec::new(),
        );
        let result = job.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::Ingestion(IngestionError::NoChannels))));
    }

    #[tokio::test]
    async fn test_cancelled_harvest_keeps_marker() {
        let provider = MockScheduleProvider::new();
        let markers = Arc::new(MemoryRunMarkerStore::new());
        let job = job_with(
            provider,
            Arc::new(MemoryScheduleStore::new()),
            markers.clone(),
            vec![Channel::new("c1", "One", "")],
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = job.run(&cancel).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.failures[0].attempts, 0);
        assert!(markers.load().await.unwrap().first_run_pending);
    }
}
