//! SerpClient is a per-provider plug-in trait, with one concrete provider: a
//! JSON HTTP API (`SerpApiProvider`) rather than screen-scraping a search
//! engine directly. Closer to how a production SEO tool actually sources
//! SERPs, and it avoids running two independent anti-bot scraping surfaces
//! (one for search results, one for competitor pages) for no real benefit.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::errors::{Result, SeoError};
use crate::core::types::{OrganicResult, SerpResult};

#[derive(Debug, Clone, Copy)]
pub enum Device {
    Desktop,
    Mobile,
}

impl Device {
    fn as_str(&self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
        }
    }
}

#[async_trait]
pub trait SerpClient: Send + Sync {
    async fn search(&self, query: &str, location: &str, language: &str, num_results: u8, device: Device) -> Result<SerpResult>;
}

/// HTTP JSON client for a SerpApi-shaped provider.
pub struct SerpApiProvider {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerpApiProvider {
    pub fn new(http_client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self { http_client, api_key, base_url }
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiOrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiOrganicResult {
    position: u8,
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SerpClient for SerpApiProvider {
    async fn search(&self, query: &str, location: &str, language: &str, num_results: u8, device: Device) -> Result<SerpResult> {
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("location", location),
                ("hl", language),
                ("num", &num_results.to_string()),
                ("device", device.as_str()),
                ("api_key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| SeoError::Serp { provider: "serpapi".to_string(), status: None, reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SeoError::Serp { provider: "serpapi".to_string(), status: Some(status.as_u16()), reason: format!("HTTP {status}") });
        }

        let body: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| SeoError::Serp { provider: "serpapi".to_string(), status: Some(status.as_u16()), reason: format!("bad JSON: {e}") })?;

        if let Some(err) = body.error {
            return Err(SeoError::Serp { provider: "serpapi".to_string(), status: Some(status.as_u16()), reason: err });
        }

        let organic_results: Vec<OrganicResult> = body
            .organic_results
            .into_iter()
            .map(|r| OrganicResult { position: r.position, url: r.link, title: r.title, snippet: r.snippet })
            .collect();

        Ok(SerpResult { query: query.to_string(), organic_results, target_ranking: None, schema_version: crate::core::types::SCHEMA_VERSION })
    }
}

/// Scans `organic_results` for a host+path match against `target_url` after
/// scheme/`www.` normalization. Used by
/// `original_source/.../serp/service.py`'s ranking lookup.
pub fn find_target_ranking(result: &SerpResult, target_url: &str) -> Option<u8> {
    let target_norm = normalize_url(target_url)?;
    result.organic_results.iter().find(|r| normalize_url(&r.url).as_deref() == Some(&target_norm)).map(|r| r.position)
}

/// `true` when `a` and `b` refer to the same page after scheme/`www.`
/// normalization. Used by the orchestrator to exclude the target's own URL
/// from the competitor list.
pub fn same_page(a: &str, b: &str) -> bool {
    match (normalize_url(a), normalize_url(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn normalize_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").to_string();
    let path = parsed.path().trim_end_matches('/').to_string();
    Some(format!("{host}{path}"))
}

/// Fixed-response test double so orchestrator tests never hit the network.
pub struct StubSerpClient {
    pub response: SerpResult,
}

impl StubSerpClient {
    pub fn new(response: SerpResult) -> Self {
        Self { response }
    }
}

#[async_trait]
impl SerpClient for StubSerpClient {
    async fn search(&self, _query: &str, _location: &str, _language: &str, _num_results: u8, _device: Device) -> Result<SerpResult> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> SerpResult {
        SerpResult {
            query: "widget framework".to_string(),
            organic_results: vec![
                OrganicResult { position: 1, url: "https://competitor-a.test/guide".to_string(), title: "A".to_string(), snippet: "".to_string() },
                OrganicResult { position: 2, url: "https://www.target.test/page/".to_string(), title: "Target".to_string(), snippet: "".to_string() },
            ],
            target_ranking: None,
            schema_version: 1,
        }
    }

    #[test]
    fn finds_ranking_ignoring_www_and_trailing_slash() {
        let result = sample_result();
        let ranking = find_target_ranking(&result, "https://target.test/page");
        assert_eq!(ranking, Some(2));
    }

    #[test]
    fn returns_none_when_target_not_in_results() {
        let result = sample_result();
        let ranking = find_target_ranking(&result, "https://nowhere.test/");
        assert_eq!(ranking, None);
    }

    #[tokio::test]
    async fn stub_client_returns_fixed_response() {
        let stub = StubSerpClient::new(sample_result());
        let out = stub.search("q", "us", "en", 10, Device::Desktop).await.unwrap();
        assert_eq!(out.organic_results.len(), 2);
    }
}
