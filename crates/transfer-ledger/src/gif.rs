//! keyword -> gif lookup
//!
//! decorative only. any failure falls back to a fixed url.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GifConfig;

#[derive(Deserialize)]
struct SearchResponse {
    data: Vec<GifObject>,
}

#[derive(Deserialize)]
struct GifObject {
    images: GifImages,
}

#[derive(Deserialize)]
struct GifImages {
    downsized_medium: GifImage,
}

#[derive(Deserialize)]
struct GifImage {
    url: String,
}

pub struct GifClient {
    config: GifConfig,
    http: Client,
}

impl GifClient {
    pub fn new(config: GifConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// search query for a keyword: spaces are dropped
    pub fn query(keyword: &str) -> String {
        keyword.split_whitespace().collect()
    }

    /// media url for `keyword`; `None` for an empty keyword
    pub async fn lookup(&self, keyword: &str) -> Option<String> {
        let query = Self::query(keyword);
        if query.is_empty() {
            return None;
        }

        match self.search(&query).await {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("gif lookup for {:?} failed: {}", query, e);
                Some(self.config.fallback_url.clone())
            }
        }
    }

    async fn search(&self, query: &str) -> Result<String, String> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[("api_key", api_key), ("q", query), ("limit", "1")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let body: SearchResponse = response.json().await.map_err(|e| e.to_string())?;
        body.data
            .into_iter()
            .next()
            .map(|gif| gif.images.downsized_medium.url)
            .ok_or_else(|| "no results".to_string())
    }
}
