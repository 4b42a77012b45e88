use std::path::Path;

use crate::archive::{ArchiveEngine, ArchiveOutcome};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{feed_list, FeedFetcher};
use crate::models::NewArticle;
use crate::services::ContentResolver;

/// Summary of one ingestion run. Failed feeds were logged and skipped; the
/// rest of the batch proceeded.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
    pub articles_ingested: usize,
    pub entries_skipped: usize,
}

pub struct App {
    config: Config,
    pub repository: Repository,
    fetcher: FeedFetcher,
    resolver: ContentResolver,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        for path in [&config.db_path, &config.feeds_path] {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::create_dir_all(&config.archive_dir)?;

        let repository = Repository::new(&config.db_path).await?;
        let fetcher = FeedFetcher::new();
        let resolver = ContentResolver::new(config.cache_duration_hours);

        Ok(Self {
            config,
            repository,
            fetcher,
            resolver,
        })
    }

    /// One ingestion run over the configured feed list: fetch every feed,
    /// resolve each entry's content, and upsert into the store. Idempotent;
    /// safe to re-run from scratch at any point.
    pub async fn run_update(&self) -> Result<UpdateOutcome> {
        let urls = feed_list::read_feeds(Path::new(&self.config.feeds_path))?;
        tracing::info!("Updating {} feeds", urls.len());

        let outcomes = self.fetcher.fetch_all(&urls).await;

        let mut summary = UpdateOutcome::default();
        for outcome in outcomes {
            let feed = match outcome.result {
                Ok(feed) => feed,
                Err(_) => {
                    // Already logged by the fetcher with the failing URL.
                    summary.feeds_failed += 1;
                    continue;
                }
            };

            let source_id = self
                .repository
                .register_or_get_source(feed.title.clone(), outcome.url.clone())
                .await?;
            summary.feeds_fetched += 1;

            for entry in feed.entries {
                if entry.link.is_empty() {
                    tracing::warn!("Skipping entry without link in {}: {}", outcome.url, entry.title);
                    summary.entries_skipped += 1;
                    continue;
                }

                let cached = self
                    .repository
                    .get_cached_content(entry.link.clone())
                    .await?;
                let resolved = self.resolver.resolve(&entry, cached.as_ref()).await;
                if resolved.scraped_now {
                    tracing::debug!("Scraped full content for {}", entry.link);
                }

                self.repository
                    .upsert_article(NewArticle {
                        title: entry.title,
                        link: entry.link,
                        published: entry.published,
                        content: resolved.content,
                        source_id,
                    })
                    .await?;
                summary.articles_ingested += 1;
            }
        }

        tracing::info!(
            "Update complete: {} feeds ok, {} failed, {} articles ingested, {} entries skipped",
            summary.feeds_fetched,
            summary.feeds_failed,
            summary.articles_ingested,
            summary.entries_skipped
        );
        Ok(summary)
    }

    /// One archival run against the store and the archive tree.
    pub async fn run_archive(&self) -> Result<ArchiveOutcome> {
        let engine = ArchiveEngine::new(
            self.config.archive_dir.clone(),
            self.config.archive_threshold_days,
        );
        engine.run(&self.repository).await
    }

    /// Register a feed: fetch it once for its title, record the source, and
    /// append the URL to the feed list.
    pub async fn add_feed(&self, url: &str) -> Result<()> {
        let feed = self.fetcher.fetch_feed(url).await?;
        self.repository
            .register_or_get_source(feed.title.clone(), url.to_string())
            .await?;
        feed_list::add_feed(Path::new(&self.config.feeds_path), url)?;
        tracing::info!("Added feed: {} ({})", feed.title, url);
        Ok(())
    }

    /// Drop a feed from the feed list and the source registry. Stored
    /// articles stay; their source link is cleared by the schema.
    pub async fn remove_feed(&self, url: &str) -> Result<()> {
        feed_list::remove_feed(Path::new(&self.config.feeds_path), url)?;
        if let Some(source) = self.repository.get_source_by_url(url.to_string()).await? {
            self.repository.delete_source(source.id).await?;
        }
        tracing::info!("Removed feed: {}", url);
        Ok(())
    }
}
