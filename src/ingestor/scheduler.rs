//! Periodic job runner.
//!
//! The scheduler owns nothing but a [`TriggerSource`] and a [`ScheduledJob`].
//! Jobs run one at a time on the scheduler task; a trigger that fires while a
//! job is running is picked up once the job returns.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::AppResult;
use crate::utils::time::{Clock, format_for_display};

/// Work the scheduler runs on each trigger
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, cancel: &CancellationToken) -> AppResult<()>;
}

/// Produces trigger instants
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Wait for the next trigger. `None` means the source is exhausted.
    async fn next_trigger(&mut self) -> Option<DateTime<Utc>>;
}

/// Fires on a cron schedule evaluated in a named time zone
pub struct CronTrigger {
    schedule: Schedule,
    timezone: Tz,
    clock: Arc<dyn Clock>,
    last_fired: Option<DateTime<Utc>>,
}

impl CronTrigger {
    pub fn new(schedule: Schedule, timezone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            schedule,
            timezone,
            clock,
            last_fired: None,
        }
    }

    /// Next fire time after the last one (or after now, initially)
    pub fn upcoming(&self) -> Option<DateTime<Utc>> {
        let reference = self.last_fired.unwrap_or_else(|| self.clock.now());
        self.schedule
            .after(&reference.with_timezone(&self.timezone))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

#[async_trait]
impl TriggerSource for CronTrigger {
    async fn next_trigger(&mut self) -> Option<DateTime<Utc>> {
        let next = self.upcoming()?;
        let now = self.clock.now();

        if next > now {
            debug!(
                "Next ingestion at {}",
                format_for_display(next, self.timezone)
            );
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            self.last_fired = Some(next);
        } else {
            // Fired while a job was running; run once now and skip any backlog
            self.last_fired = Some(now);
        }
        Some(next)
    }
}

/// Fires whenever a unit is sent on its channel; used by tests and `ingest`
pub struct ManualTrigger {
    rx: mpsc::Receiver<()>,
    clock: Arc<dyn Clock>,
}

impl ManualTrigger {
    pub fn new(clock: Arc<dyn Clock>) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self { rx, clock })
    }
}

#[async_trait]
impl TriggerSource for ManualTrigger {
    async fn next_trigger(&mut self) -> Option<DateTime<Utc>> {
        self.rx.recv().await.map(|_| self.clock.now())
    }
}

pub struct SchedulerService {
    trigger: Box<dyn TriggerSource>,
    job: Arc<dyn ScheduledJob>,
    run_on_startup: bool,
}

impl SchedulerService {
    pub fn new(trigger: Box<dyn TriggerSource>, job: Arc<dyn ScheduledJob>, run_on_startup: bool) -> Self {
        Self {
            trigger,
            job,
            run_on_startup,
        }
    }

    /// Run until cancelled or the trigger source is exhausted
    pub async fn run(mut self, cancellation_token: CancellationToken) -> Result<()> {
        info!("Starting ingestion scheduler for job '{}'", self.job.name());

        if self.run_on_startup {
            info!("Running '{}' on startup", self.job.name());
            self.execute(&cancellation_token).await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("Ingestion scheduler received cancellation signal, shutting down");
                    break;
                }
                next = self.trigger.next_trigger() => match next {
                    Some(fired_at) => {
                        info!("Trigger fired at {}", fired_at.format("%Y-%m-%d %H:%M:%S UTC"));
                        self.execute(&cancellation_token).await;
                    }
                    None => {
                        info!("Trigger source closed, stopping scheduler");
                        break;
                    }
                }
            }
        }

        info!("Ingestion scheduler stopped");
        Ok(())
    }

    async fn execute(&self, cancellation_token: &CancellationToken) {
        if cancellation_token.is_cancelled() {
            return;
        }
        let started = tokio::time::Instant::now();
        match self.job.execute(cancellation_token).await {
            Ok(()) => info!(
                "Job '{}' finished in {:?}",
                self.job.name(),
                started.elapsed()
            ),
            Err(e) => error!("Job '{}' failed: {}", self.job.name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::utils::time::ManualClock;
    use chrono::TimeZone;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn execute(&self, _cancel: &CancellationToken) -> AppResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::internal("boom"));
            }
            Ok(())
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2023, 1, 1, 21, 59, 0).unwrap()))
    }

    #[tokio::test]
    async fn test_runs_job_once_per_manual_tick() {
        let (tx, trigger) = ManualTrigger::new(clock());
        let job = Arc::new(CountingJob::default());
        let scheduler = SchedulerService::new(Box::new(trigger), job.clone(), false);

        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        drop(tx);

        scheduler.run(CancellationToken::new()).await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_run_on_startup_and_failures_do_not_stop_the_loop() {
        let (tx, trigger) = ManualTrigger::new(clock());
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let scheduler = SchedulerService::new(Box::new(trigger), job.clone(), true);

        tx.send(()).await.unwrap();
        drop(tx);

        scheduler.run(CancellationToken::new()).await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        assert!(logs_contain("Job 'counting' failed: Internal error: boom"));
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let (tx, trigger) = ManualTrigger::new(clock());
        let job = Arc::new(CountingJob::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(SchedulerService::new(Box::new(trigger), job.clone(), false).run(cancel.clone()));

        tx.send(()).await.unwrap();
        while job.runs.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_trigger_waits_for_next_fire_time() {
        let schedule = Schedule::from_str("0 0 22 * * *").unwrap();
        let mut trigger = CronTrigger::new(schedule, chrono_tz::UTC, clock());

        let started = tokio::time::Instant::now();
        let fired = trigger.next_trigger().await.unwrap();
        assert_eq!(fired, Utc.with_ymd_and_hms(2023, 1, 1, 22, 0, 0).unwrap());
        assert!(started.elapsed() >= Duration::from_secs(60));

        // Clock did not move, so the next fire is the following evening
        assert_eq!(
            trigger.upcoming(),
            Some(Utc.with_ymd_and_hms(2023, 1, 2, 22, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_cron_evaluated_in_local_zone() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2023, 7, 1, 12, 0, 0).unwrap()));
        let schedule = Schedule::from_str("0 0 22 * * *").unwrap();
        let trigger = CronTrigger::new(schedule, chrono_tz::Europe::London, clock);
        // 22:00 BST
        assert_eq!(
            trigger.upcoming(),
            Some(Utc.with_ymd_and_hms(2023, 7, 1, 21, 0, 0).unwrap())
        );
    }
}
