//! Write side: fetch windows, mapping, the retrying fetch cycle, the harvest
//! job built on it and the scheduler that triggers it.

pub mod cycle;
pub mod fetch_window;
pub mod job;
pub mod mapper;
pub mod scheduler;

pub use cycle::{ChannelFailure, CycleReport, CycleSettings, IngestionCycle};
pub use fetch_window::compute_window;
pub use job::{HarvestJob, HarvestSummary};
pub use mapper::AssetScheduleMapper;
pub use scheduler::{CronTrigger, ManualTrigger, ScheduledJob, SchedulerService, TriggerSource};
