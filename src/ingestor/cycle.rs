//! Staggered per-channel fetching with bounded batch retries.
//!
//! One cycle fetches every channel once (a round), waits for all of them to
//! report, then re-runs only the channels that failed. Rounds repeat until
//! nothing is left or the retry cap is reached.
//!
//! Workers never share state. Each dispatched fetch runs in its own task and
//! sends a single [`FetchReport`] back to the coordinator, which owns the
//! accumulator and the failed set.

use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::fetch_window::compute_window;
use super::mapper::AssetScheduleMapper;
use crate::config::{Config, RetryBackoff};
use crate::errors::{AppResult, IngestionError, SourceError};
use crate::models::{Channel, NormalizedSchedule};
use crate::sources::ScheduleProvider;
use crate::utils::time::Clock;

const CANCELLED_REASON: &str = "cancelled before dispatch";
const LOST_WORKER_REASON: &str = "fetch task exited without reporting";

/// Timing and retry knobs for a cycle
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub horizon_days: u32,
    pub timezone: Tz,
    pub fetch_interval: Duration,
    pub request_timeout: Duration,
    pub retry_gap: Duration,
    pub retry_backoff: RetryBackoff,
    pub max_retry_gap: Duration,
    pub max_retry_rounds: u32,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let ingestion = &config.ingestion;
        Ok(Self {
            horizon_days: ingestion.horizon_days,
            timezone: ingestion.timezone()?,
            fetch_interval: ingestion.fetch_interval,
            request_timeout: config.provider.request_timeout,
            retry_gap: ingestion.retry_gap,
            retry_backoff: ingestion.retry_backoff,
            max_retry_gap: ingestion.max_retry_gap,
            max_retry_rounds: ingestion.max_retry_rounds,
        })
    }

    /// Wait before retry round `retry` (1-based)
    pub fn retry_delay(&self, retry: u32) -> Duration {
        match self.retry_backoff {
            RetryBackoff::Fixed => self.retry_gap,
            RetryBackoff::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.retry_gap
                    .saturating_mul(factor)
                    .min(self.max_retry_gap)
            }
        }
    }
}

/// A channel that never produced records during the cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel_id: String,
    /// Fetches actually dispatched for this channel
    pub attempts: u32,
    pub last_error: String,
}

/// Outcome of one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Records from every channel that succeeded, in arrival order
    pub schedules: Vec<NormalizedSchedule>,
    pub failures: Vec<ChannelFailure>,
    /// Rounds run, including the initial one
    pub rounds: u32,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn failed_channel_ids(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.channel_id.clone()).collect()
    }

    /// Collapse into the records, or a terminal error carrying them as partial data
    pub fn into_result(self) -> Result<Vec<NormalizedSchedule>, IngestionError> {
        if self.cancelled {
            return Err(IngestionError::Cancelled {
                pending: self.failures.len(),
                partial: self.schedules,
            });
        }
        if !self.failures.is_empty() {
            return Err(IngestionError::RetriesExhausted {
                rounds: self.rounds,
                failed_channels: self.failed_channel_ids(),
                partial: self.schedules,
            });
        }
        Ok(self.schedules)
    }
}

/// Message a fetch worker sends back to the coordinator
#[derive(Debug)]
struct FetchReport {
    channel_id: String,
    result: Result<Vec<NormalizedSchedule>, SourceError>,
}

#[derive(Debug, Default)]
struct RoundOutcome {
    schedules: Vec<NormalizedSchedule>,
    dispatched: Vec<String>,
    failed: Vec<(Channel, String)>,
    undispatched: Vec<Channel>,
}

pub struct IngestionCycle {
    provider: Arc<dyn ScheduleProvider>,
    mapper: Arc<AssetScheduleMapper>,
    clock: Arc<dyn Clock>,
    settings: CycleSettings,
}

impl IngestionCycle {
    pub fn new(
        provider: Arc<dyn ScheduleProvider>,
        mapper: AssetScheduleMapper,
        clock: Arc<dyn Clock>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            provider,
            mapper: Arc::new(mapper),
            clock,
            settings,
        }
    }

    /// Fetch every channel, retrying failed ones as a reduced batch.
    ///
    /// Never fails outright: unresolved channels are listed in
    /// [`CycleReport::failures`] next to everything that was gathered.
    pub async fn run_cycle(
        &self,
        channels: &[Channel],
        is_first_run: bool,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("ingestion_cycle", %cycle_id, first_run = is_first_run);
        self.run_rounds(cycle_id, channels, is_first_run, cancel)
            .instrument(span)
            .await
    }

    async fn run_rounds(
        &self,
        cycle_id: Uuid,
        channels: &[Channel],
        is_first_run: bool,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport {
            cycle_id,
            schedules: Vec::new(),
            failures: Vec::new(),
            rounds: 0,
            cancelled: false,
        };
        let mut pending = unique_channels(channels);
        if pending.is_empty() {
            return report;
        }

        info!("Starting ingestion cycle for {} channel(s)", pending.len());

        let mut attempts: HashMap<String, u32> = HashMap::new();
        let mut last_errors: HashMap<String, String> = HashMap::new();

        loop {
            report.rounds += 1;
            let outcome = self.run_round(&pending, is_first_run, cancel).await;

            for channel_id in &outcome.dispatched {
                *attempts.entry(channel_id.clone()).or_default() += 1;
            }
            report.schedules.extend(outcome.schedules);

            let mut failed: Vec<Channel> = Vec::with_capacity(outcome.failed.len());
            for (channel, reason) in outcome.failed {
                last_errors.insert(channel.id.clone(), reason);
                failed.push(channel);
            }
            if !outcome.undispatched.is_empty() {
                report.cancelled = true;
                for channel in outcome.undispatched {
                    last_errors
                        .entry(channel.id.clone())
                        .or_insert_with(|| CANCELLED_REASON.to_string());
                    failed.push(channel);
                }
            }

            info!(
                "Round {} finished: {} record(s) so far, {} channel(s) failed",
                report.rounds,
                report.schedules.len(),
                failed.len()
            );

            pending = failed;
            if pending.is_empty() {
                break;
            }
            if report.cancelled || cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if report.rounds > self.settings.max_retry_rounds {
                warn!(
                    "Retry cap of {} round(s) reached with {} channel(s) unresolved",
                    self.settings.max_retry_rounds,
                    pending.len()
                );
                break;
            }

            let delay = self.settings.retry_delay(report.rounds);
            warn!(
                "Retrying {} channel(s) in {}",
                pending.len(),
                humantime::format_duration(delay)
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Ingestion cancelled while waiting to retry");
                    report.cancelled = true;
                    break;
                }
                _ = sleep(delay) => {}
            }
        }

        report.failures = pending
            .into_iter()
            .map(|channel| ChannelFailure {
                attempts: attempts.get(&channel.id).copied().unwrap_or(0),
                last_error: last_errors
                    .remove(&channel.id)
                    .unwrap_or_else(|| CANCELLED_REASON.to_string()),
                channel_id: channel.id,
            })
            .collect();

        if report.is_complete() {
            info!(
                "Ingestion cycle complete: {} record(s) in {} round(s)",
                report.schedules.len(),
                report.rounds
            );
        } else {
            warn!(
                "Ingestion cycle ended with {} unresolved channel(s): {}",
                report.failures.len(),
                report.failed_channel_ids().join(", ")
            );
        }
        report
    }

    /// Dispatch one staggered fetch per channel and wait for all of them
    async fn run_round(
        &self,
        batch: &[Channel],
        is_first_run: bool,
        cancel: &CancellationToken,
    ) -> RoundOutcome {
        let (tx, mut rx) = mpsc::channel::<FetchReport>(batch.len().max(1));
        let round_start = Instant::now();
        let mut outcome = RoundOutcome::default();
        let mut outstanding: HashMap<String, Channel> = HashMap::new();

        for (i, channel) in batch.iter().enumerate() {
            let offset = self.settings.fetch_interval.saturating_mul(i as u32);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Ingestion cancelled; {} channel(s) not dispatched", batch.len() - i);
                    outcome.undispatched.extend(batch[i..].iter().cloned());
                    break;
                }
                _ = sleep_until(round_start + offset) => {}
            }

            debug!("Dispatching fetch {} for channel {}", i, channel.id);
            outstanding.insert(channel.id.clone(), channel.clone());
            outcome.dispatched.push(channel.id.clone());
            self.spawn_fetch(channel.clone(), is_first_run, tx.clone());
        }
        drop(tx);

        // Barrier: every dispatched worker reports once, or drops its sender
        while let Some(report) = rx.recv().await {
            let Some(channel) = outstanding.remove(&report.channel_id) else {
                continue;
            };
            match report.result {
                Ok(records) => {
                    debug!("Channel {} returned {} record(s)", channel.id, records.len());
                    outcome.schedules.extend(records);
                }
                Err(e) => {
                    warn!("Fetch failed for channel {}: {}", channel.id, e);
                    outcome.failed.push((channel, e.to_string()));
                }
            }
        }

        for (_, channel) in outstanding.drain() {
            warn!("Channel {} fetch task exited without reporting", channel.id);
            outcome.failed.push((channel, LOST_WORKER_REASON.to_string()));
        }

        outcome
    }

    fn spawn_fetch(&self, channel: Channel, is_first_run: bool, tx: mpsc::Sender<FetchReport>) {
        let provider = Arc::clone(&self.provider);
        let mapper = Arc::clone(&self.mapper);
        let window = compute_window(
            self.clock.now(),
            is_first_run,
            self.settings.horizon_days,
            self.settings.timezone,
        );
        let request_timeout = self.settings.request_timeout;

        tokio::spawn(async move {
            let result = match timeout(request_timeout, provider.fetch_schedule(&channel.id, &window)).await {
                Ok(Ok(raw)) => Ok(mapper.normalize(&channel, raw)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SourceError::Timeout {
                    channel_id: channel.id.clone(),
                    timeout_secs: request_timeout.as_secs(),
                }),
            };
            // Coordinator only goes away if the whole cycle was dropped
            let _ = tx
                .send(FetchReport {
                    channel_id: channel.id,
                    result,
                })
                .await;
        });
    }
}

/// First occurrence of each channel id, in input order
fn unique_channels(channels: &[Channel]) -> Vec<Channel> {
    let mut seen = HashSet::with_capacity(channels.len());
    channels
        .iter()
        .filter(|channel| {
            let first = seen.insert(channel.id.as_str());
            if !first {
                warn!("Duplicate channel id {} in batch, fetching it once", channel.id);
            }
            first
        })
        .cloned()
        .collect()
}
