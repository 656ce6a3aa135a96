//! Control surface of the underlying media player.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;

use animenow_core::models::EpisodeLink;

/// Events a player reports back to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    Buffering,
    TimeUpdated { position: Duration, duration: Duration },
    Ended,
    Failed(String),
}

/// Event sink handed to the player on attach.
///
/// Tagged with the attachment generation so events from a previous
/// attachment can be told apart.
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    attachment: u64,
    tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
}

impl PlayerEvents {
    pub(crate) fn new(attachment: u64, tx: mpsc::UnboundedSender<(u64, PlayerEvent)>) -> Self {
        Self { attachment, tx }
    }

    pub fn attachment(&self) -> u64 {
        self.attachment
    }

    /// Report an event. Returns `false` once the session is gone.
    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.tx.send((self.attachment, event)).is_ok()
    }
}

/// A media player exclusively owned by one session.
pub trait Player: Send + 'static {
    /// Load the given links, replacing whatever was loaded before.
    fn attach(&mut self, links: &BTreeSet<EpisodeLink>, events: PlayerEvents);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, to: Duration);
    fn detach(&mut self);
}
