use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub mod provider;
pub mod timeline;

pub use provider::*;
pub use timeline::*;

/// A broadcast channel as held by the channel directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub logo: String,
}

impl Channel {
    pub fn new<I: Into<String>, T: Into<String>, L: Into<String>>(id: I, title: T, logo: L) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            logo: logo.into(),
        }
    }
}

/// Category tag attached to an asset by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCategory {
    #[serde(default, deserialize_with = "provider::null_as_default")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dvb: Option<String>,
}

/// Editorial summaries in the lengths the provider publishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
}

/// Canonical schedule record produced by ingestion and handed to storage.
///
/// `end_date` is always `start_date + duration_minutes`; use [`NormalizedSchedule::new`]
/// rather than building the struct by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSchedule {
    pub channel_id: String,
    pub asset_id: String,
    pub schedule_id: String,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub image_url: String,
    #[serde(default)]
    pub categories: Vec<AssetCategory>,
    #[serde(default)]
    pub summary: Option<AssetSummary>,
    pub channel_title: String,
    pub channel_logo: String,
}

impl NormalizedSchedule {
    /// Build a record for `channel`, deriving `end_date` from the duration
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: &Channel,
        schedule_id: String,
        asset_id: String,
        title: String,
        start_date: DateTime<Utc>,
        duration_minutes: u32,
        image_url: String,
        categories: Vec<AssetCategory>,
        summary: Option<AssetSummary>,
    ) -> Self {
        Self {
            channel_id: channel.id.clone(),
            asset_id,
            schedule_id,
            title,
            start_date,
            end_date: start_date + Duration::minutes(i64::from(duration_minutes)),
            duration_minutes,
            image_url,
            categories,
            summary,
            channel_title: channel.title.clone(),
            channel_logo: channel.logo.clone(),
        }
    }

    pub fn has_category(&self, code: &str) -> bool {
        self.categories.iter().any(|c| c.code == code)
    }
}

/// Time range requested from the provider for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// ISO-8601 (UTC, second precision) rendering used on the wire
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.start_iso(), self.end_iso())
    }
}

/// Persisted cadence marker. Absent marker means the first run is still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMarker {
    pub first_run_pending: bool,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Default for RunMarker {
    fn default() -> Self {
        Self {
            first_run_pending: true,
            last_run_at: None,
        }
    }
}
