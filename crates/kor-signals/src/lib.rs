//! External signal fetchers for the opportunity pipeline.
//!
//! Each fetcher hits one upstream (store search, autosuggest, trend
//! API, forum feeds) with a single bounded attempt and degrades to a
//! deterministic keyword-seeded simulation on any failure, so a
//! scoring run always has a full signal set to work with.

use std::sync::Arc;
use std::time::Duration;

use kor_client::HttpClient;

pub mod expand;
pub mod forum;
pub mod listings;
pub mod painpoints;
pub mod sim;
pub mod social;
pub mod trends;

pub use expand::KeywordExpander;
pub use forum::{ForumDirectory, ForumPost, ForumSearchBackend, RedditBackend};
pub use listings::{ListingFetcher, TOP_N_LISTINGS};
pub use painpoints::PainPointScanner;
pub use social::SocialFetcher;
pub use trends::TrendsFetcher;

pub const CRATE_NAME: &str = "kor-signals";

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub trend_api_key: Option<String>,
    pub forum_directory: ForumDirectory,
    /// Pause between forum requests within one call chain.
    pub forum_delay: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            trend_api_key: None,
            forum_directory: ForumDirectory::default(),
            forum_delay: Duration::from_millis(1100),
        }
    }
}

/// The full fetcher set used by the scorer, sharing one HTTP client
/// and one forum backend.
pub struct SignalFetchers {
    pub listings: ListingFetcher,
    pub expander: KeywordExpander,
    pub trends: TrendsFetcher,
    pub social: SocialFetcher,
    pub pain_points: PainPointScanner,
}

impl SignalFetchers {
    pub fn new(client: Arc<HttpClient>, config: SignalConfig) -> Self {
        let backend: Arc<dyn ForumSearchBackend> = Arc::new(RedditBackend::new(client.clone()));
        Self::with_backend(client, backend, config)
    }

    /// Same wiring with a caller-supplied forum backend, used by tests.
    pub fn with_backend(
        client: Arc<HttpClient>,
        backend: Arc<dyn ForumSearchBackend>,
        config: SignalConfig,
    ) -> Self {
        Self {
            listings: ListingFetcher::new(client.clone()),
            expander: KeywordExpander::new(client.clone()),
            trends: TrendsFetcher::new(client, config.trend_api_key),
            social: SocialFetcher::new(
                backend.clone(),
                config.forum_directory.clone(),
                config.forum_delay,
            ),
            pain_points: PainPointScanner::new(
                backend,
                config.forum_directory,
                config.forum_delay,
            ),
        }
    }
}
