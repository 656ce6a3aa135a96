//! Collaborator contracts consumed by the playback session.
//!
//! The session never talks to the network itself; it asks implementations of
//! these traits for episodes, providers and links, so any backend (remote
//! catalog, local files, test fixtures) can sit behind it.

use std::collections::BTreeSet;
use std::future::Future;

use animenow_core::models::{Anime, AnyEpisodeRepresentable, EpisodeLink};

/// Identifier of a streaming provider able to resolve episodes to links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("no providers available")]
    NoProviders,
}

/// Supplies the ordered episode list of an anime.
pub trait EpisodeSource: Send + Sync {
    fn fetch_episodes(
        &self,
        anime_id: u64,
    ) -> impl Future<Output = Result<Vec<AnyEpisodeRepresentable>, FetchError>> + Send;
}

/// Finds providers that can serve a given episode.
pub trait ProviderDiscovery: Send + Sync {
    fn find_providers(
        &self,
        anime: &Anime,
        episode: &AnyEpisodeRepresentable,
    ) -> impl Future<Output = Result<Vec<ProviderId>, FetchError>> + Send;
}

/// Resolves an episode on one provider into playable links.
pub trait SourceResolver: Send + Sync {
    fn fetch_links(
        &self,
        provider: &ProviderId,
        episode: &AnyEpisodeRepresentable,
    ) -> impl Future<Output = Result<BTreeSet<EpisodeLink>, FetchError>> + Send;
}

/// Everything a playback session needs from the outside world.
pub trait AnimeClient: EpisodeSource + ProviderDiscovery + SourceResolver {}

impl<T: EpisodeSource + ProviderDiscovery + SourceResolver> AnimeClient for T {}
