use std::process::ExitCode;

mod app;
mod archive;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod services;

use app::App;
use config::Config;
use error::{AppError, Result};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (stderr, overridable via RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args).await {
        // Exit 2: some feeds or archive groups were skipped (details logged).
        Ok(true) => ExitCode::from(2),
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Dispatch the requested batch operations. Returns whether the run was a
/// partial failure.
async fn run(args: Vec<String>) -> Result<bool> {
    let mut do_update = false;
    let mut do_archive = false;
    let mut add_feed: Option<String> = None;
    let mut remove_feed: Option<String> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--update" => do_update = true,
            "--archive" => do_archive = true,
            "--add-feed" => {
                add_feed = Some(iter.next().cloned().ok_or_else(|| {
                    AppError::Config("--add-feed requires a URL".to_string())
                })?)
            }
            "--remove-feed" => {
                remove_feed = Some(iter.next().cloned().ok_or_else(|| {
                    AppError::Config("--remove-feed requires a URL".to_string())
                })?)
            }
            other => {
                return Err(AppError::Config(format!(
                    "unknown argument: {} (expected --update, --archive, --add-feed <url> or --remove-feed <url>)",
                    other
                )))
            }
        }
    }

    if !do_update && !do_archive && add_feed.is_none() && remove_feed.is_none() {
        return Err(AppError::Config(
            "no operation requested; pass --update and/or --archive".to_string(),
        ));
    }

    let config = Config::load()?;
    let app = App::new(config).await?;

    if let Some(url) = add_feed {
        app.add_feed(&url).await?;
    }
    if let Some(url) = remove_feed {
        app.remove_feed(&url).await?;
    }

    let mut partial = false;

    if do_update {
        let outcome = app.run_update().await?;
        println!(
            "Updated {} feeds ({} failed), {} articles ingested",
            outcome.feeds_fetched, outcome.feeds_failed, outcome.articles_ingested
        );
        partial |= outcome.feeds_failed > 0;
    }

    if do_archive {
        let outcome = app.run_archive().await?;
        println!(
            "Archived {} articles in {} files ({} groups failed, {} skipped for unparseable dates)",
            outcome.archived,
            outcome.files.len(),
            outcome.failed_groups,
            outcome.skipped_unparseable
        );
        partial |= outcome.failed_groups > 0;
    }

    Ok(partial)
}
