use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, CachedContent, NewArticle, Source};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    /// Insert a source if the URL is unseen, otherwise return the existing id.
    /// The name is never overwritten here so feed metadata churn cannot
    /// clobber an operator-chosen name. Safe to race: the conditional insert
    /// plus read-back converges on one row per URL.
    pub async fn register_or_get_source(&self, name: String, url: String) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sources (name, url) VALUES (?1, ?2) ON CONFLICT(url) DO NOTHING",
                    params![name, url],
                )?;
                let id: i64 = conn.query_row(
                    "SELECT id FROM sources WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn rename_source(&self, id: i64, new_name: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET name = ?1 WHERE id = ?2",
                    params![new_name, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_source(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_source_by_url(&self, url: String) -> Result<Option<Source>> {
        let source = self
            .conn
            .call(move |conn| {
                let source = conn
                    .query_row(
                        "SELECT id, name, url FROM sources WHERE url = ?1",
                        params![url],
                        |row| Ok(source_from_row(row)),
                    )
                    .optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    // Read-mostly interface consumed by the interactive reader.

    #[allow(dead_code)]
    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, name, url FROM sources ORDER BY name ASC")?;
                let sources = stmt
                    .query_map([], |row| Ok(source_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    // Article operations

    /// Prior content and resolution stamp for a link, used for the
    /// cache-staleness decision before re-scraping.
    pub async fn get_cached_content(&self, link: String) -> Result<Option<CachedContent>> {
        let cached = self
            .conn
            .call(move |conn| {
                let cached = conn
                    .query_row(
                        "SELECT content, resolved_at FROM articles WHERE link = ?1",
                        params![link],
                        |row| {
                            let content: String = row.get(0)?;
                            let resolved_at: Option<String> = row.get(1)?;
                            Ok(CachedContent {
                                content,
                                resolved_at: resolved_at.and_then(|s| parse_datetime(&s)),
                            })
                        },
                    )
                    .optional()?;
                Ok(cached)
            })
            .await?;
        Ok(cached)
    }

    /// Insert or refresh an article keyed on its link. Every call refreshes
    /// title, published, content and source and stamps `resolved_at`, so
    /// re-running ingestion on the same entry converges to the same row.
    /// Returns the stable id regardless of insert-vs-update path.
    pub async fn upsert_article(&self, article: NewArticle) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let id: i64 = conn.query_row(
                    r#"INSERT INTO articles (title, link, published, content, resolved_at, source_id)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(link) DO UPDATE SET
                           title = excluded.title,
                           published = excluded.published,
                           content = excluded.content,
                           resolved_at = excluded.resolved_at,
                           source_id = excluded.source_id
                       RETURNING id"#,
                    params![
                        article.title,
                        article.link,
                        article.published,
                        article.content,
                        Utc::now().to_rfc3339(),
                        article.source_id,
                    ],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        "SELECT id, title, link, published, content, resolved_at, source_id
                         FROM articles WHERE id = ?1",
                        params![id],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    #[allow(dead_code)]
    pub async fn list_articles_by_source(&self, source_id: i64) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, link, published, content, resolved_at, source_id
                       FROM articles
                       WHERE source_id = ?1
                       ORDER BY
                           CASE
                               WHEN published <> '' THEN datetime(published)
                               ELSE datetime('1970-01-01')
                           END DESC"#,
                )?;
                let articles = stmt
                    .query_map(params![source_id], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Full scan used by the archival candidate selection.
    pub async fn get_all_articles(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, link, published, content, resolved_at, source_id
                     FROM articles ORDER BY id ASC",
                )?;
                let articles = stmt
                    .query_map([], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Remove migrated rows. Tag links go with them via ON DELETE CASCADE.
    pub async fn delete_articles(&self, ids: Vec<i64>) -> Result<usize> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut deleted = 0;
                for id in &ids {
                    deleted += tx.execute("DELETE FROM articles WHERE id = ?1", params![id])?;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    #[allow(dead_code)]
    pub async fn article_count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Tag operations

    #[allow(dead_code)]
    pub async fn add_tag(&self, article_id: i64, tag: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tags (tag) VALUES (?1) ON CONFLICT(tag) DO NOTHING",
                    params![tag],
                )?;
                let tag_id: i64 = conn.query_row(
                    "SELECT id FROM tags WHERE tag = ?1",
                    params![tag],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT INTO article_tags (article_id, tag_id) VALUES (?1, ?2)
                     ON CONFLICT(article_id, tag_id) DO NOTHING",
                    params![article_id, tag_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn remove_tag(&self, article_id: i64, tag: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM article_tags
                     WHERE article_id = ?1
                       AND tag_id = (SELECT id FROM tags WHERE tag = ?2)",
                    params![article_id, tag],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn tags_for_article(&self, article_id: i64) -> Result<Vec<String>> {
        let tags = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.tag FROM tags t
                     JOIN article_tags at ON t.id = at.tag_id
                     WHERE at.article_id = ?1
                     ORDER BY t.tag ASC",
                )?;
                let tags = stmt
                    .query_map(params![article_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    /// Articles carrying ALL of the given tags.
    #[allow(dead_code)]
    pub async fn search_by_tags(&self, tags: Vec<String>) -> Result<Vec<Article>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let articles = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; tags.len()].join(",");
                let sql = format!(
                    r#"SELECT a.id, a.title, a.link, a.published, a.content, a.resolved_at, a.source_id
                       FROM articles a
                       JOIN article_tags at ON a.id = at.article_id
                       JOIN tags t ON t.id = at.tag_id
                       WHERE t.tag IN ({})
                       GROUP BY a.id
                       HAVING COUNT(DISTINCT t.tag) = {}"#,
                    placeholders,
                    tags.len()
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(rusqlite::params_from_iter(tags.iter()), |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn source_from_row(row: &Row) -> Source {
    Source {
        id: row.get(0).unwrap(),
        name: row.get(1).unwrap(),
        url: row.get(2).unwrap(),
    }
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        title: row.get(1).unwrap(),
        link: row.get(2).unwrap(),
        published: row.get(3).unwrap(),
        content: row.get(4).unwrap(),
        resolved_at: row
            .get::<_, Option<String>>(5)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        source_id: row.get(6).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let repo = Repository::new(db_path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn entry(link: &str) -> NewArticle {
        NewArticle {
            title: "A title".to_string(),
            link: link.to_string(),
            published: "2026-01-05T10:00:00+00:00".to_string(),
            content: "Body text".to_string(),
            source_id: 1,
        }
    }

    #[tokio::test]
    async fn register_or_get_source_dedups_on_url() {
        let (_dir, repo) = test_repo().await;

        let first = repo
            .register_or_get_source("Example".into(), "https://example.com/feed".into())
            .await
            .unwrap();
        let second = repo
            .register_or_get_source("Different Name".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        assert_eq!(first, second);

        // Re-registration must not clobber the original name.
        let sources = repo.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Example");
    }

    #[tokio::test]
    async fn rename_and_delete_source() {
        let (_dir, repo) = test_repo().await;

        let id = repo
            .register_or_get_source("Old".into(), "https://example.com/feed".into())
            .await
            .unwrap();
        repo.rename_source(id, "New".into()).await.unwrap();
        let sources = repo.list_sources().await.unwrap();
        assert_eq!(sources[0].name, "New");

        repo.delete_source(id).await.unwrap();
        assert!(repo.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_dedups_on_link_with_stable_id() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        let first = repo.upsert_article(entry("https://example.com/a")).await.unwrap();
        let second = repo.upsert_article(entry("https://example.com/a")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.article_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_converges_on_identical_input() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        let id = repo.upsert_article(entry("https://example.com/a")).await.unwrap();
        let before = repo.get_article(id).await.unwrap().unwrap();

        repo.upsert_article(entry("https://example.com/a")).await.unwrap();
        let after = repo.get_article(id).await.unwrap().unwrap();

        assert_eq!(before.title, after.title);
        assert_eq!(before.link, after.link);
        assert_eq!(before.published, after.published);
        assert_eq!(before.content, after.content);
        assert_eq!(before.source_id, after.source_id);
        // resolved_at is the one field re-stamped on every upsert
        assert!(after.resolved_at.is_some());
    }

    #[tokio::test]
    async fn upsert_refreshes_mutable_fields() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        let id = repo.upsert_article(entry("https://example.com/a")).await.unwrap();

        let mut updated = entry("https://example.com/a");
        updated.title = "Revised title".to_string();
        updated.content = "Revised body".to_string();
        repo.upsert_article(updated).await.unwrap();

        let article = repo.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.title, "Revised title");
        assert_eq!(article.content, "Revised body");
    }

    #[tokio::test]
    async fn cached_content_roundtrip() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        assert!(repo
            .get_cached_content("https://example.com/missing".into())
            .await
            .unwrap()
            .is_none());

        repo.upsert_article(entry("https://example.com/a")).await.unwrap();
        let cached = repo
            .get_cached_content("https://example.com/a".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.content, "Body text");
        assert!(cached.resolved_at.is_some());
    }

    #[tokio::test]
    async fn search_by_tags_requires_all_tags() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();

        let a = repo.upsert_article(entry("https://example.com/a")).await.unwrap();
        let b = repo.upsert_article(entry("https://example.com/b")).await.unwrap();

        repo.add_tag(a, "rust".into()).await.unwrap();
        repo.add_tag(a, "news".into()).await.unwrap();
        repo.add_tag(b, "rust".into()).await.unwrap();

        let both = repo
            .search_by_tags(vec!["rust".into(), "news".into()])
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, a);

        let rust_only = repo.search_by_tags(vec!["rust".into()]).await.unwrap();
        assert_eq!(rust_only.len(), 2);

        assert!(repo.search_by_tags(vec![]).await.unwrap().is_empty());
        assert!(repo
            .search_by_tags(vec!["absent".into()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn add_tag_is_idempotent_and_removable() {
        let (_dir, repo) = test_repo().await;
        repo.register_or_get_source("S".into(), "https://example.com/feed".into())
            .await
            .unwrap();
        let id = repo.upsert_article(entry("https://example.com/a")).await.unwrap();

        repo.add_tag(id, "rust".into()).await.unwrap();
        repo.add_tag(id, "rust".into()).await.unwrap();
        assert_eq!(repo.tags_for_article(id).await.unwrap(), vec!["rust"]);

        repo.remove_tag(id, "rust".into()).await.unwrap();
        assert!(repo.tags_for_article(id).await.unwrap().is_empty());
    }
}
