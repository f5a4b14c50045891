//! Provider payload to [`NormalizedSchedule`] mapping.

use tracing::trace;

use crate::models::{Channel, NormalizedSchedule, RawAsset, RawScheduleEntry};

/// Turns raw provider entries into storage records for one channel
#[derive(Debug, Clone)]
pub struct AssetScheduleMapper {
    placeholder_image_url: String,
}

impl AssetScheduleMapper {
    pub fn new<S: Into<String>>(placeholder_image_url: S) -> Self {
        Self {
            placeholder_image_url: placeholder_image_url.into(),
        }
    }

    /// Normalize every entry; nothing is dropped and input order is kept.
    pub fn normalize(&self, channel: &Channel, raw_entries: Vec<RawScheduleEntry>) -> Vec<NormalizedSchedule> {
        raw_entries
            .into_iter()
            .map(|entry| self.normalize_entry(channel, entry))
            .collect()
    }

    fn normalize_entry(&self, channel: &Channel, entry: RawScheduleEntry) -> NormalizedSchedule {
        let asset = entry.asset.unwrap_or_default();
        let image_url = self.resolve_artwork(&asset);
        trace!(
            "Mapped schedule {} on channel {} (asset '{}', image {})",
            entry.id, channel.id, asset.id, image_url
        );

        NormalizedSchedule::new(
            channel,
            entry.id,
            asset.id,
            entry.title,
            entry.date_time,
            entry.duration,
            image_url,
            asset.category,
            asset.summary,
        )
    }

    /// First non-empty default rendition across related items, in payload order
    fn resolve_artwork(&self, asset: &RawAsset) -> String {
        asset
            .related
            .iter()
            .flatten()
            .filter_map(|related| related.media.as_ref())
            .flat_map(|media| media.iter())
            .find_map(|media| media.default_href())
            .map(str::to_string)
            .unwrap_or_else(|| self.placeholder_image_url.clone())
    }
}
