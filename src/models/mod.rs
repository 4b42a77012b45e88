use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered feed source. `url` is the feed URL and is unique; the name is
/// set on first encounter and only changed by an explicit rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
}

/// A stored article. `link` is the sole deduplication key across all feeds.
/// `published` keeps the original timestamp text as the feed supplied it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub published: String,
    pub content: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub source_id: Option<i64>,
}

/// Input for an article upsert. `resolved_at` is stamped by the store.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub published: String,
    pub content: String,
    pub source_id: i64,
}

/// Prior resolution state for an existing row, consulted before re-scraping.
#[derive(Debug, Clone)]
pub struct CachedContent {
    pub content: String,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One normalized item from a parsed feed document, before resolution.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Published-or-updated timestamp rendered to RFC 3339, empty when the
    /// feed supplied neither.
    pub published: String,
    pub content_html: Option<String>,
    pub summary_html: Option<String>,
}

/// A parsed feed document with its normalized entries.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}

/// One article as serialized into a cold-storage archive file. Tag names are
/// embedded so the record stays self-describing after the live row is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub published: String,
    pub content: String,
    pub source_id: Option<i64>,
    pub tags: Vec<String>,
}
