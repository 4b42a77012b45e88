//! Age-based migration of articles out of the live store into compressed,
//! date-partitioned archive files. A row is deleted only after the file
//! covering it has been written and synced; a failed group stays live and is
//! retried on the next run.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::db::Repository;
use crate::error::Result;
use crate::models::ArchiveRecord;

pub struct ArchiveEngine {
    root: PathBuf,
    threshold_days: u32,
}

#[derive(Debug, Default)]
pub struct ArchiveOutcome {
    pub archived: usize,
    pub skipped_unparseable: usize,
    pub failed_groups: usize,
    pub files: Vec<PathBuf>,
}

impl ArchiveEngine {
    pub fn new(root: impl Into<PathBuf>, threshold_days: u32) -> Self {
        Self {
            root: root.into(),
            threshold_days,
        }
    }

    /// One archival run: select candidates, group by publication
    /// (year, month), write one compressed file per group, then delete the
    /// migrated rows group by group.
    pub async fn run(&self, repository: &Repository) -> Result<ArchiveOutcome> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.threshold_days as i64);

        let mut outcome = ArchiveOutcome::default();
        let mut groups: BTreeMap<(i32, u32), Vec<ArchiveRecord>> = BTreeMap::new();

        for article in repository.get_all_articles().await? {
            let published = match parse_published(&article.published) {
                Some(dt) => dt,
                None => {
                    // Never archive on a guessed date.
                    outcome.skipped_unparseable += 1;
                    tracing::warn!(
                        "Skipping article {} ({}): unparseable published date {:?}",
                        article.id,
                        article.link,
                        article.published
                    );
                    continue;
                }
            };

            if published >= cutoff {
                continue;
            }

            let tags = repository.tags_for_article(article.id).await?;
            groups
                .entry((published.year(), published.month()))
                .or_default()
                .push(ArchiveRecord {
                    id: article.id,
                    title: article.title,
                    link: article.link,
                    published: article.published,
                    content: article.content,
                    source_id: article.source_id,
                    tags,
                });
        }

        for ((year, month), records) in groups {
            let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
            match self.write_group(year, month, &records, now) {
                Ok(path) => {
                    tracing::info!("Archived {} articles to {}", records.len(), path.display());
                    // The file is durable; the rows may go.
                    repository.delete_articles(ids).await?;
                    outcome.archived += records.len();
                    outcome.files.push(path);
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to archive group {}/{:02}: {}; rows left live for retry",
                        year,
                        month,
                        e
                    );
                    outcome.failed_groups += 1;
                }
            }
        }

        if outcome.archived == 0 && outcome.failed_groups == 0 {
            tracing::info!("No articles eligible for archival");
        }

        Ok(outcome)
    }

    /// Serialize one (year, month) group to
    /// `root/YYYY/MM/articles_YYYY_MM_DD_HHMMSS.json.gz` and sync it to disk.
    fn write_group(
        &self,
        year: i32,
        month: u32,
        records: &[ArchiveRecord],
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let dir = self.root.join(year.to_string()).join(format!("{:02}", month));
        fs::create_dir_all(&dir)?;

        let file_name = format!(
            "articles_{}_{}.json.gz",
            now.format("%Y_%m_%d"),
            now.format("%H%M%S")
        );
        let path = dir.join(file_name);

        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, records)?;
        encoder.finish()?.sync_all()?;

        Ok(path)
    }
}

/// Lenient parse of the stored free-form publish timestamp. Feeds deliver
/// RFC 3339 (Atom) and RFC 2822 (RSS); legacy rows may carry naive formats.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}
