use crate::error::{PressError, Result};
use crate::traits::ImageProvider;
use async_trait::async_trait;
use serde::Deserialize;

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

/// Unsplash search client returning the first landscape hit per query.
#[derive(Clone)]
pub struct UnsplashClient {
    http: reqwest::Client,
    access_key: String,
}

impl UnsplashClient {
    pub fn new(access_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            access_key: access_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageProvider for UnsplashClient {
    #[tracing::instrument(level = "debug", skip_all, fields(query = %query))]
    async fn find_image(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(PressError::InvalidInput("empty image query".to_string()));
        }

        let response = self
            .http
            .get(UNSPLASH_SEARCH_URL)
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PressError::Http(format!(
                "unsplash search status={status} body={body}"
            )));
        }

        let parsed: UnsplashSearchResponse = serde_json::from_str(&body)?;
        parsed
            .results
            .into_iter()
            .next()
            .map(|photo| photo.urls.regular)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PressError::ParseFailed(format!("no unsplash results for: {query}")))
    }
}

#[derive(Debug, Deserialize)]
struct UnsplashSearchResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    #[serde(default)]
    regular: String,
}

/// Search queries for an article: the title finds the hero, the rest
/// vary by index so repeated lookups return different photos.
pub fn image_queries(title: &str, category: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i == 0 {
                title.to_string()
            } else {
                format!("{category} technology concept {}", i + 1)
            }
        })
        .collect()
}

/// Run every lookup concurrently and keep the ones that succeed.
/// A failed lookup costs one image, never the whole batch.
pub async fn collect_images(provider: &dyn ImageProvider, queries: &[String]) -> Vec<String> {
    let lookups = queries.iter().map(|q| provider.find_image(q));
    let results = futures_util::future::join_all(lookups).await;

    let mut urls = Vec::new();
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(url) => urls.push(url),
            Err(e) => {
                tracing::warn!(%query, error = %e, "image lookup failed; continuing without it");
            }
        }
    }
    urls
}
