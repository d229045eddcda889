//! TED talks search adapter.
//!
//! Calls `GET {base}/talks.json` with the topic as the query and reads the
//! `results` array. Entries missing a title or duration are dropped.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tedclub_core::config::TedConfig;
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::SearchProvider;
use tedclub_core::types::SearchHit;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const FIELDS: &str = "title,description,duration";

/// TED API client.
pub struct TedSearch {
    api_key: String,
    base_url: String,
    limit: u32,
    client: reqwest::Client,
}

impl TedSearch {
    pub fn new(config: &TedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| TedClubError::Http(format!("TED client: {e}")))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limit: config.limit,
            client,
        })
    }

    fn talks_url(&self) -> String {
        format!("{}/talks.json", self.base_url)
    }
}

/// Ids may arrive as numbers or strings.
fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the `results` array of a search response.
pub(crate) fn parse_results(json: &Value) -> Result<Vec<SearchHit>> {
    let results = json["results"]
        .as_array()
        .ok_or_else(|| TedClubError::SearchFailed("response has no results array".into()))?;

    let hits = results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let title = r["title"].as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            let duration = r["duration"]
                .as_u64()
                .or_else(|| r["duration"].as_str().and_then(|s| s.parse().ok()))?;
            Some(SearchHit {
                id: value_to_id(&r["id"])
                    .or_else(|| r["slug"].as_str().map(String::from))
                    .unwrap_or_else(|| format!("result-{i}")),
                title: title.to_string(),
                description: r["description"].as_str().unwrap_or_default().to_string(),
                duration_secs: u32::try_from(duration).unwrap_or(u32::MAX),
                url: r["url"].as_str().map(String::from),
            })
        })
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchProvider for TedSearch {
    fn name(&self) -> &str {
        "ted"
    }

    async fn search(&self, topic: &str) -> Result<Vec<SearchHit>> {
        if self.api_key.is_empty() {
            return Err(TedClubError::ApiKeyMissing("ted".into()));
        }

        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(self.talks_url())
            .query(&[
                ("q", topic),
                ("api-key", self.api_key.as_str()),
                ("fields", FIELDS),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TedClubError::Http(format!("TED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(TedClubError::SearchFailed(format!(
                "TED API returned {}",
                resp.status()
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| TedClubError::SearchFailed(format!("invalid TED response: {e}")))?;
        let hits = parse_results(&json)?;
        tracing::debug!("🔎 TED search '{}' returned {} talks", topic, hits.len());
        Ok(hits)
    }
}
