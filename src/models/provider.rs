//! Wire shapes of the schedule provider's JSON payload.
//!
//! Only the fields the mapper consumes are modelled; everything else in the
//! payload is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{AssetCategory, AssetSummary};

/// Deserialize an explicit `null` the same way as a missing key.
///
/// Use together with `#[serde(default)]`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level schedule response: `{"item": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item: Vec<RawScheduleEntry>,
}

/// One scheduled broadcast as returned by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScheduleEntry {
    /// Schedule id
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub date_time: DateTime<Utc>,
    /// Minutes
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: u32,
    #[serde(default)]
    pub asset: Option<RawAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAsset {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Vec<AssetCategory>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related: Vec<Option<RelatedItem>>,
    #[serde(default)]
    pub summary: Option<AssetSummary>,
}

/// A related item (brand, series, episode...) carrying artwork
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedItem {
    #[serde(default)]
    pub media: Option<OneOrMany<Media>>,
}

/// The provider sends `media` as a single object for some related items
/// and as an array for others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::Many(items) => items.iter(),
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub rendition: Option<Renditions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Renditions {
    #[serde(default)]
    pub default: Option<Rendition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rendition {
    #[serde(default)]
    pub href: Option<String>,
}

impl Media {
    /// The default rendition URL, if present and non-empty
    pub fn default_href(&self) -> Option<&str> {
        self.rendition
            .as_ref()?
            .default
            .as_ref()?
            .href
            .as_deref()
            .filter(|href| !href.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_media_as_object_or_array() {
        let body = r#"{
            "item": [{
                "id": "s1",
                "title": "News",
                "dateTime": "2023-01-01T10:00:00Z",
                "duration": 30,
                "asset": {
                    "id": "a1",
                    "category": [{"code": "news", "name": "News"}],
                    "related": [
                        {"media": {"rendition": {"default": {"href": "http://img/one.jpg"}}}},
                        {"media": [{"rendition": {"default": {"href": "http://img/two.jpg"}}}]},
                        null
                    ],
                    "summary": {"short": "Headlines"}
                }
            }]
        }"#;

        let response: ScheduleResponse = serde_json::from_str(body).unwrap();
        let asset = response.item[0].asset.as_ref().unwrap();
        assert_eq!(asset.related.len(), 3);

        let first = asset.related[0].as_ref().unwrap().media.as_ref().unwrap();
        assert_eq!(first.iter().next().unwrap().default_href(), Some("http://img/one.jpg"));

        let second = asset.related[1].as_ref().unwrap().media.as_ref().unwrap();
        assert_eq!(second.iter().count(), 1);
        assert!(asset.related[2].is_none());
    }

    #[test]
    fn test_missing_optional_blocks_default() {
        let body = r#"{"item": [{"id": "s2", "dateTime": "2023-01-01T10:00:00Z"}]}"#;
        let response: ScheduleResponse = serde_json::from_str(body).unwrap();
        let entry = &response.item[0];
        assert_eq!(entry.duration, 0);
        assert!(entry.asset.is_none());
        assert!(entry.title.is_empty());
    }

    #[test]
    fn test_null_fields_decode_like_missing_ones() {
        let empty: ScheduleResponse = serde_json::from_str(r#"{"item": null}"#).unwrap();
        assert!(empty.item.is_empty());

        let body = r#"{"item": [{"id": "s3", "title": null, "dateTime": "2023-01-01T10:00:00Z",
            "duration": null, "asset": {"id": null, "category": null, "related": null}}]}"#;
        let response: ScheduleResponse = serde_json::from_str(body).unwrap();
        let entry = &response.item[0];
        assert_eq!(entry.title, "");
        assert_eq!(entry.duration, 0);
        let asset = entry.asset.as_ref().unwrap();
        assert_eq!(asset.id, "");
        assert!(asset.category.is_empty());
        assert!(asset.related.is_empty());
    }

    #[test]
    fn test_blank_href_is_not_a_rendition() {
        let media = Media {
            rendition: Some(Renditions {
                default: Some(Rendition {
                    href: Some("  ".to_string()),
                }),
            }),
        };
        assert_eq!(media.default_href(), None);
    }
}
