//! Guide read path: stored schedules to per-channel timelines

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::reconstruct::build_timeline;
use crate::errors::AppResult;
use crate::models::{Channel, NormalizedSchedule, Timeline, TimelineWindow};
use crate::storage::{ChannelDirectory, ScheduleQuery, ScheduleStore};

/// A guide request for a window, optionally narrowed to channels and a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel_ids: Option<Vec<String>>,
    /// Category code; `"all"` or `None` disables the filter
    pub category: Option<String>,
}

impl GuideRequest {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            channel_ids: None,
            category: None,
        }
    }
}

pub struct GuideService {
    store: Arc<dyn ScheduleStore>,
    channels: Arc<dyn ChannelDirectory>,
}

impl GuideService {
    pub fn new(store: Arc<dyn ScheduleStore>, channels: Arc<dyn ChannelDirectory>) -> Self {
        Self { store, channels }
    }

    /// One timeline per channel, ordered by channel title then id.
    ///
    /// Channels named in the request that have no stored records still get a
    /// timeline made of a single filler covering the window.
    pub async fn build_guide(&self, request: &GuideRequest) -> AppResult<Vec<Timeline>> {
        let window = TimelineWindow::new(request.start, request.end)?;

        let mut query = ScheduleQuery::window(request.start, request.end);
        query.channel_ids = request.channel_ids.clone();
        query.category = request.category.clone();

        let records = self.store.find_schedules(&query).await?;
        debug!("Guide query matched {} schedules", records.len());

        let mut by_channel: BTreeMap<String, Vec<NormalizedSchedule>> = BTreeMap::new();
        for record in records {
            by_channel
                .entry(record.channel_id.clone())
                .or_default()
                .push(record);
        }

        if let Some(requested) = &request.channel_ids {
            for channel_id in requested {
                by_channel.entry(channel_id.clone()).or_default();
            }
        }

        let known: BTreeMap<String, Channel> = if by_channel.values().any(Vec::is_empty) {
            self.channels
                .list_channels()
                .await?
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect()
        } else {
            BTreeMap::new()
        };

        let mut timelines: Vec<Timeline> = by_channel
            .iter()
            .map(|(channel_id, schedules)| {
                let mut timeline = build_timeline(channel_id, schedules, &window);
                if schedules.is_empty() {
                    if let Some(channel) = known.get(channel_id) {
                        timeline.channel_title = channel.title.clone();
                        timeline.channel_logo = channel.logo.clone();
                    }
                }
                timeline
            })
            .collect();

        timelines.sort_by(|a, b| {
            a.channel_title
                .cmp(&b.channel_title)
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });

        info!(
            "Built guide for {} channel(s) over {} .. {}",
            timelines.len(),
            request.start.to_rfc3339(),
            request.end.to_rfc3339()
        );
        Ok(timelines)
    }
}
