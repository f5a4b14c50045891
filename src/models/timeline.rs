//! Read-side guide types: windows, slots and reconstructed timelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NormalizedSchedule;
use crate::errors::{AppError, AppResult};

pub const FILLER_TITLE: &str = "No Program";

/// Half-open `[start, end)` interval a timeline must cover exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimelineWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::validation(format!(
                "timeline window start {} must precede end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Synthetic "No Program" slot covering an interval with no known content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillerEntry {
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FillerEntry {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            title: FILLER_TITLE.to_string(),
            start_date,
            end_date,
            duration_minutes: (end_date - start_date).num_minutes(),
        }
    }
}

/// A stored schedule placed on the timeline.
///
/// `start_date`/`end_date` are the boundaries the slot occupies; they equal the
/// schedule's own unless the slot was clipped by an earlier overlapping entry or
/// by the window edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSlot {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub clipped: bool,
    pub schedule: NormalizedSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    Scheduled(ScheduledSlot),
    Filler(FillerEntry),
}

impl TimelineEntry {
    pub fn start_date(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Scheduled(slot) => slot.start_date,
            TimelineEntry::Filler(filler) => filler.start_date,
        }
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Scheduled(slot) => slot.end_date,
            TimelineEntry::Filler(filler) => filler.end_date,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TimelineEntry::Scheduled(slot) => &slot.schedule.title,
            TimelineEntry::Filler(filler) => &filler.title,
        }
    }

    pub fn is_filler(&self) -> bool {
        matches!(self, TimelineEntry::Filler(_))
    }

    pub fn schedule(&self) -> Option<&NormalizedSchedule> {
        match self {
            TimelineEntry::Scheduled(slot) => Some(&slot.schedule),
            TimelineEntry::Filler(_) => None,
        }
    }
}

/// Contiguous per-channel guide row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub channel_id: String,
    pub channel_title: String,
    pub channel_logo: String,
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Number of entries backed by a stored schedule
    pub fn scheduled_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_filler()).count()
    }
}
