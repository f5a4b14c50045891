//! PressAssociation TV API schedule provider
//!
//! Issues `GET {base_url}/schedule?channelId=..&start=..&end=..&aliases=true`
//! and decodes the `{"item": [...]}` body. The fetch timeout is applied by the
//! ingestion cycle around each call, not by this client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::ProviderConfig;
use crate::errors::{SourceError, SourceResult};
use crate::models::{FetchWindow, RawScheduleEntry, ScheduleResponse};
use crate::sources::traits::ScheduleProvider;

const SOURCE_TYPE: &str = "press_association";

pub struct PressAssociationClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PressAssociationClient {
    pub fn new(config: &ProviderConfig) -> SourceResult<Self> {
        Url::parse(&config.base_url).map_err(|e| SourceError::InvalidConfig {
            field: "provider.base_url".to_string(),
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(concat!("epg-grid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::InvalidConfig {
                field: "provider".to_string(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    /// Schedule URL for one channel and window
    pub fn schedule_url(&self, channel_id: &str, window: &FetchWindow) -> SourceResult<Url> {
        let endpoint = format!("{}/schedule", self.base_url);
        Url::parse_with_params(
            &endpoint,
            &[
                ("channelId", channel_id),
                ("start", window.start_iso().as_str()),
                ("end", window.end_iso().as_str()),
                ("aliases", "true"),
            ],
        )
        .map_err(|e| SourceError::InvalidConfig {
            field: "provider.base_url".to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ScheduleProvider for PressAssociationClient {
    async fn fetch_schedule(
        &self,
        channel_id: &str,
        window: &FetchWindow,
    ) -> SourceResult<Vec<RawScheduleEntry>> {
        let url = self.schedule_url(channel_id, window)?;
        debug!("Fetching schedule for channel {} ({})", channel_id, window);

        let mut request = self.client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::network(format!("channel {channel_id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::network(format!("channel {channel_id}: {e}")))?;

        let payload: ScheduleResponse = serde_json::from_slice(&body)
            .map_err(|e| SourceError::parse(SOURCE_TYPE, e.to_string()))?;

        debug!(
            "Fetched {} schedule entries for channel {}",
            payload.item.len(),
            channel_id
        );
        Ok(payload.item)
    }
}
