/// Listening-data provider abstraction
///
/// The match runner only depends on this trait, so the Last.fm client can be
/// swapped for another listening-history source or a stub in tests.
use crate::{
    error::AppResult,
    models::{ArtistEntry, ListenerProfile, Window},
};

pub mod lastfm;

pub use lastfm::LastfmProvider;

/// Source of per-user listening history
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ListeningDataProvider: Send + Sync {
    /// Ranked top artists of a user for one window, most played first
    async fn fetch_top_artists(
        &self,
        username: &str,
        window: Window,
        limit: u32,
    ) -> AppResult<Vec<ArtistEntry>>;

    /// Public profile of a user; fails with `NotFound` for unknown users
    async fn fetch_profile(&self, username: &str) -> AppResult<ListenerProfile>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
