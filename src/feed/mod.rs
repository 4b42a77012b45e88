pub mod feed_list;
mod fetcher;

pub use fetcher::{FeedFetcher, FetchOutcome};
