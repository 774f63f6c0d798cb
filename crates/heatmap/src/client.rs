//! Element-stats fetching and the re-authentication seam
//!
//! The store talks to these traits, never to HTTP directly; tests plug
//! in stubs, production uses `HttpStatsClient` against the analytics
//! API.

use crate::error::{HeatmapError, Result};
use crate::types::EventRecord;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

/// Fetch aggregated click events for a page URL
#[async_trait]
pub trait StatsClient: Send + Sync {
    /// Returns the recorded events for `page_url`, or
    /// `HeatmapError::AuthRequired` when the session token was rejected.
    async fn element_stats(&self, page_url: &str) -> Result<Vec<EventRecord>>;
}

/// Out-of-band re-authentication collaborator, invoked on 403
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self);
}

#[derive(Serialize)]
struct StatsProperty<'a> {
    key: &'a str,
    value: &'a str,
}

/// HTTP client for `GET {api_url}api/element/stats/`
pub struct HttpStatsClient {
    http: reqwest::Client,
    api_url: Url,
    temporary_token: String,
}

impl HttpStatsClient {
    pub fn new(api_url: Url, temporary_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            temporary_token: temporary_token.into(),
        }
    }

    fn stats_url(&self, page_url: &str) -> Result<Url> {
        let mut url = self.api_url.join("api/element/stats/")?;
        let properties = serde_json::to_string(&[StatsProperty {
            key: "$current_url",
            value: page_url,
        }])?;
        url.query_pairs_mut()
            .append_pair("properties", &properties)
            .append_pair("temporary_token", &self.temporary_token);
        Ok(url)
    }
}

#[async_trait]
impl StatsClient for HttpStatsClient {
    async fn element_stats(&self, page_url: &str) -> Result<Vec<EventRecord>> {
        let url = self.stats_url(page_url)?;
        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            return Err(HeatmapError::AuthRequired);
        }

        let records = response.error_for_status()?.json::<Vec<EventRecord>>().await?;
        Ok(records)
    }
}
