//! The feed list: one feed URL per line in a plain text file. This is the
//! fetcher's sole input. Adds append; removes rewrite the file filtered.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Read the configured feed URLs, creating an empty file on first use.
pub fn read_feeds(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "")?;
        tracing::info!("Created empty feed list at {}", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Append a feed URL, skipping exact duplicates.
pub fn add_feed(path: &Path, url: &str) -> Result<()> {
    let feeds = read_feeds(path)?;
    if feeds.iter().any(|f| f == url) {
        tracing::info!("Feed already listed: {}", url);
        return Ok(());
    }

    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", url)?;
    Ok(())
}

/// Remove a feed URL by rewriting the file without it.
pub fn remove_feed(path: &Path, url: &str) -> Result<()> {
    let feeds = read_feeds(path)?;
    let mut remaining = feeds
        .iter()
        .filter(|f| f.as_str() != url)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if !remaining.is_empty() {
        remaining.push('\n');
    }
    fs::write(path, remaining)?;
    Ok(())
}
