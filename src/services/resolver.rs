use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use scraper::{Html, Selector};

use crate::models::{CachedContent, FeedEntry};

/// Extracted text shorter than this is treated as a teaser or stub, not a
/// real article body, and never satisfies the cache.
pub const MIN_CONTENT_LEN: usize = 200;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// The canonical content decided for an entry. `scraped_now` distinguishes a
/// fresh page extraction from feed-payload fallback; it only feeds logging.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub content: String,
    pub scraped_now: bool,
}

/// Decides, for each feed entry, whether cached content is still trustworthy
/// and otherwise re-derives it: full-page extraction first, feed payload as
/// the fallback.
pub struct ContentResolver {
    client: Client,
    cache_duration: ChronoDuration,
}

impl ContentResolver {
    pub fn new(cache_duration_hours: u32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT_STRING)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            cache_duration: ChronoDuration::hours(cache_duration_hours as i64),
        }
    }

    /// Cached content is reusable iff it looks like a real article body and
    /// was resolved within the cache window.
    pub fn is_fresh(&self, cached: &CachedContent, now: DateTime<Utc>) -> bool {
        if cached.content.len() < MIN_CONTENT_LEN {
            return false;
        }
        match cached.resolved_at {
            Some(resolved_at) => now - resolved_at < self.cache_duration,
            None => false,
        }
    }

    pub async fn resolve(&self, entry: &FeedEntry, cached: Option<&CachedContent>) -> Resolved {
        if let Some(cached) = cached {
            if self.is_fresh(cached, Utc::now()) {
                return Resolved {
                    content: cached.content.clone(),
                    scraped_now: false,
                };
            }
        }

        let scraped = self.fetch_full_page(&entry.link).await;
        if !scraped.is_empty() {
            return Resolved {
                content: scraped,
                scraped_now: true,
            };
        }

        Resolved {
            content: fallback_text(entry),
            scraped_now: false,
        }
    }

    /// Fetch the article page and extract its paragraph text. Any failure
    /// yields an empty string, which signals the caller to fall back to the
    /// feed payload.
    async fn fetch_full_page(&self, link: &str) -> String {
        let response = match self.client.get(link).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Error fetching article content from {}: {}", link, e);
                return String::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Failed to fetch {}: HTTP {}", link, response.status());
            return String::new();
        }

        let html = match response.text().await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("Error reading article content from {}: {}", link, e);
                return String::new();
            }
        };

        extract_article_text(&html)
    }
}

/// Collect paragraph text blocks in document order, one separator per block.
/// Paragraphs inside the first `<article>` element are preferred; without
/// one, every `<p>` in the document counts as article body.
fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article").expect("valid selector");
    let p_selector = Selector::parse("p").expect("valid selector");

    let paragraphs: Vec<String> = match document.select(&article_selector).next() {
        Some(article) => article
            .select(&p_selector)
            .map(|p| p.text().collect::<String>())
            .collect(),
        None => document
            .select(&p_selector)
            .map(|p| p.text().collect::<String>())
            .collect(),
    };

    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain-text rendition of the feed-supplied payload, preferring the full
/// content field over the summary. Links and images are stripped.
fn fallback_text(entry: &FeedEntry) -> String {
    let raw = entry
        .content_html
        .as_deref()
        .or(entry.summary_html.as_deref())
        .unwrap_or("");

    if raw.is_empty() {
        return String::new();
    }

    html2text::config::plain_no_decorate()
        .string_from_read(raw.as_bytes(), 80)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entry(content_html: Option<&str>, summary_html: Option<&str>) -> FeedEntry {
        FeedEntry {
            title: "Title".to_string(),
            link: "http://127.0.0.1:1/article".to_string(),
            published: String::new(),
            content_html: content_html.map(String::from),
            summary_html: summary_html.map(String::from),
        }
    }

    fn cached(age_hours: i64, len: usize) -> CachedContent {
        CachedContent {
            content: "x".repeat(len),
            resolved_at: Some(Utc::now() - ChronoDuration::hours(age_hours)),
        }
    }

    #[test]
    fn recent_long_content_is_fresh() {
        let resolver = ContentResolver::new(24);
        assert!(resolver.is_fresh(&cached(1, 500), Utc::now()));
    }

    #[test]
    fn content_older_than_cache_window_is_stale() {
        let resolver = ContentResolver::new(24);
        assert!(!resolver.is_fresh(&cached(25, 500), Utc::now()));
    }

    #[test]
    fn short_content_is_never_fresh() {
        let resolver = ContentResolver::new(24);
        assert!(!resolver.is_fresh(&cached(1, MIN_CONTENT_LEN - 1), Utc::now()));
    }

    #[test]
    fn missing_resolution_stamp_is_stale() {
        let resolver = ContentResolver::new(24);
        let cached = CachedContent {
            content: "x".repeat(500),
            resolved_at: None,
        };
        assert!(!resolver.is_fresh(&cached, Utc::now()));
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_without_network() {
        let resolver = ContentResolver::new(24);
        let cached = cached(1, 500);

        // The entry link points at a closed local port; reaching the network
        // would fail, so a cached result proves the short-circuit.
        let resolved = resolver.resolve(&entry(None, None), Some(&cached)).await;
        assert_eq!(resolved.content, cached.content);
        assert!(!resolved.scraped_now);
    }

    #[tokio::test]
    async fn failed_extraction_falls_back_to_feed_content() {
        let resolver = ContentResolver::new(24);
        let entry = entry(
            Some("<p>Full <b>content</b> body</p>"),
            Some("<p>Short summary</p>"),
        );

        let resolved = resolver.resolve(&entry, None).await;
        assert!(resolved.content.contains("Full content body"));
        assert!(!resolved.content.contains("Short summary"));
        assert!(!resolved.scraped_now);
    }

    #[tokio::test]
    async fn fallback_uses_summary_when_content_is_absent() {
        let resolver = ContentResolver::new(24);
        let entry = entry(None, Some("<p>Only a summary</p>"));

        let resolved = resolver.resolve(&entry, None).await;
        assert!(resolved.content.contains("Only a summary"));
        assert!(!resolved.scraped_now);
    }

    #[test]
    fn extraction_prefers_article_element() {
        let html = r#"<html><body>
            <p>Navigation junk</p>
            <article><p>Lead paragraph.</p><p>Second paragraph.</p></article>
            <p>Footer junk</p>
        </body></html>"#;

        let text = extract_article_text(html);
        assert_eq!(text, "Lead paragraph.\nSecond paragraph.");
    }

    #[test]
    fn extraction_falls_back_to_all_paragraphs() {
        let html = "<html><body><div><p>One.</p></div><p>Two.</p></body></html>";
        assert_eq!(extract_article_text(html), "One.\nTwo.");
    }

    #[test]
    fn extraction_without_paragraphs_yields_empty() {
        assert_eq!(extract_article_text("<html><body><div>text</div></body></html>"), "");
    }

    #[test]
    fn fallback_text_strips_markup_and_links() {
        let entry = entry(
            Some(r#"<p>Read <a href="http://tracker.example/x">this piece</a> today</p>"#),
            None,
        );
        let text = fallback_text(&entry);
        assert!(text.contains("this piece"));
        assert!(!text.contains("tracker.example"));
        assert!(!text.contains("<p>"));
    }
}
