use serde::{Deserialize, Serialize};

/// What the session is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadingPhase {
    #[default]
    None,
    FetchingEpisodes,
    FetchingSources,
    Buffering,
}

impl LoadingPhase {
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    /// Text shown next to the loading indicator, if any.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::FetchingEpisodes => Some("Loading Episodes"),
            Self::FetchingSources => Some("Loading Sources"),
            Self::Buffering | Self::None => None,
        }
    }
}

/// The stage that last failed. All of these are retryable by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, thiserror::Error,
)]
pub enum ErrorPhase {
    #[default]
    #[error("no error")]
    None,
    #[error("Failed to load episodes")]
    FailedToLoadEpisodes,
    #[error("No providers available for this episode.")]
    FailedToFindProviders,
    #[error("Failed to load sources")]
    FailedToLoadSources,
}

impl ErrorPhase {
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Playing,
    Paused,
    Seeking,
}

/// Failure reported by the player itself. Surfaced, never auto-recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("player error: {0}")]
pub struct PlayerError(pub String);

/// The three orthogonal state axes of a session.
///
/// Fields are private so every update goes through the setters, which keep
/// loading and error mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Phases {
    loading: LoadingPhase,
    error: ErrorPhase,
    playback: PlaybackPhase,
}

impl Phases {
    pub fn loading(&self) -> LoadingPhase {
        self.loading
    }

    pub fn error(&self) -> ErrorPhase {
        self.error
    }

    pub fn playback(&self) -> PlaybackPhase {
        self.playback
    }

    /// Enter a loading phase. A non-`None` phase clears any error.
    pub fn set_loading(&mut self, loading: LoadingPhase) {
        self.loading = loading;
        if !loading.is_none() {
            self.error = ErrorPhase::None;
        }
    }

    /// Record a failed stage. Any loading phase ends.
    pub fn fail(&mut self, error: ErrorPhase) {
        self.error = error;
        if !error.is_none() {
            self.loading = LoadingPhase::None;
        }
    }

    pub fn clear_error(&mut self) {
        self.error = ErrorPhase::None;
    }

    pub fn set_playback(&mut self, playback: PlaybackPhase) {
        self.playback = playback;
    }
}
