use std::time::Duration;

use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;

use crate::error::Result;
use crate::models::{FeedEntry, FetchedFeed};

/// Bound on how long one unreachable feed may stall its slot in the batch.
const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_CONCURRENT_FETCHES: usize = 5;
const USER_AGENT_STRING: &str = "feedvault/0.3";

/// Per-URL result of a batch fetch. A failed feed is reported, not raised, so
/// one bad URL never aborts the rest of the batch.
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<FetchedFeed>,
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT_STRING)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed_document(&bytes)
    }

    /// Fetch and parse every URL with bounded fan-out. Each request has an
    /// independent timeout and an independent failure path.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchOutcome> {
        stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let result = self.fetch_feed(&url).await;
                match &result {
                    Ok(feed) => {
                        tracing::debug!("Fetched {} entries from {}", feed.entries.len(), url)
                    }
                    Err(e) => tracing::warn!("Feed unusable this cycle {}: {}", url, e),
                }
                FetchOutcome { url, result }
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a raw feed document and normalize its entries.
fn parse_feed_document(bytes: &[u8]) -> Result<FetchedFeed> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Unknown Source".to_string());

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .map(|entry| FeedEntry {
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            link: entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            published: entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
            content_html: entry.content.and_then(|c| c.body),
            summary_html: entry.summary.map(|s| s.content),
        })
        .collect();

    Ok(FetchedFeed { title, entries })
}
