//! Gap-free timeline reconstruction.
//!
//! Turns a sparse, possibly overlapping set of stored schedules into an ordered
//! sequence that covers a window exactly, inserting "No Program" fillers where
//! nothing is known.
//!
//! Overlaps resolve as earliest-start-wins: once an entry has been placed, a
//! later-starting entry that begins before it ends is clipped to start where
//! the placed one ends, or dropped if nothing of it remains.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::models::{
    FillerEntry, NormalizedSchedule, ScheduledSlot, Timeline, TimelineEntry, TimelineWindow,
};

/// Build the timeline for `channel_id` over `window`.
///
/// `entries` may be unsorted, may include other channels and zero-length
/// records; those are ignored. The result always partitions `window`.
pub fn build_timeline(
    channel_id: &str,
    entries: &[NormalizedSchedule],
    window: &TimelineWindow,
) -> Timeline {
    let mut candidates: Vec<&NormalizedSchedule> = entries
        .iter()
        .filter(|s| s.channel_id == channel_id)
        .collect();
    candidates.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.schedule_id.cmp(&b.schedule_id))
    });

    let (channel_title, channel_logo) = candidates
        .first()
        .map(|s| (s.channel_title.clone(), s.channel_logo.clone()))
        .unwrap_or_default();

    let mut timeline_entries = Vec::with_capacity(candidates.len() * 2 + 1);
    let mut cursor = window.start();

    for schedule in candidates {
        if schedule.end_date <= schedule.start_date {
            trace!("Skipping zero-length schedule {}", schedule.schedule_id);
            continue;
        }

        let slot_start = schedule.start_date.max(cursor);
        let slot_end = schedule.end_date.min(window.end());
        if slot_end <= slot_start {
            // outside the window, or swallowed by an earlier entry
            continue;
        }

        if slot_start > cursor {
            timeline_entries.push(filler(cursor, slot_start));
        }

        timeline_entries.push(TimelineEntry::Scheduled(ScheduledSlot {
            start_date: slot_start,
            end_date: slot_end,
            clipped: slot_start != schedule.start_date || slot_end != schedule.end_date,
            schedule: schedule.clone(),
        }));
        cursor = slot_end;
    }

    if cursor < window.end() {
        timeline_entries.push(filler(cursor, window.end()));
    }

    Timeline {
        channel_id: channel_id.to_string(),
        channel_title,
        channel_logo,
        entries: timeline_entries,
    }
}

fn filler(start: DateTime<Utc>, end: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry::Filler(FillerEntry::new(start, end))
}
