//! Async driver for a [`PlaybackSession`].
//!
//! The session runs inside a single task that owns it together with the
//! player. User intents, fetch results and player events are all funneled
//! into that task, so state is only ever mutated in one place.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use animenow_api::traits::{AnimeClient, FetchError};
use animenow_core::models::{Anime, AnyEpisodeRepresentable, EpisodeLink};

use crate::player::{Player, PlayerEvent, PlayerEvents};
use crate::session::{Effect, FetchStage, Message, PlaybackSession, SessionSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("playback session is closed")]
    SessionClosed,
}

/// Clonable handle to a running session.
///
/// The session tears itself down once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Message>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    fn send(&self, message: Message) -> Result<(), RuntimeError> {
        self.intents
            .send(message)
            .map_err(|_| RuntimeError::SessionClosed)
    }

    pub fn select_episode(&self, number: u32) -> Result<(), RuntimeError> {
        self.send(Message::SelectEpisode(number))
    }

    pub fn retry(&self) -> Result<(), RuntimeError> {
        self.send(Message::Retry)
    }

    pub fn toggle_playback(&self) -> Result<(), RuntimeError> {
        self.send(Message::TogglePlayback)
    }

    pub fn start_seeking(&self) -> Result<(), RuntimeError> {
        self.send(Message::StartSeeking)
    }

    /// Move the scrubber to `progress` (`0.0..=1.0`) of the duration.
    pub fn slide_seeker(&self, progress: f64) -> Result<(), RuntimeError> {
        self.send(Message::SlidingSeeker(progress))
    }

    pub fn done_seeking(&self) -> Result<(), RuntimeError> {
        self.send(Message::DoneSeeking)
    }

    pub fn close(&self) -> Result<(), RuntimeError> {
        self.send(Message::Close)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next published state.
    pub async fn changed(&mut self) -> Result<SessionSnapshot, RuntimeError> {
        self.snapshot
            .changed()
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        Ok(self.snapshot.borrow_and_update().clone())
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, RuntimeError> {
        let snapshot = self
            .snapshot
            .wait_for(predicate)
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        Ok(snapshot.clone())
    }
}

/// Create a session for `anime` and start driving it.
///
/// `placeholders` is what the episode list shows until the real one arrives.
pub fn start<C, P>(
    anime: Anime,
    placeholders: Vec<AnyEpisodeRepresentable>,
    selected: u32,
    client: Arc<C>,
    player: P,
) -> SessionHandle
where
    C: AnimeClient + 'static,
    P: Player,
{
    let (session, effects) = PlaybackSession::new(anime, placeholders, selected);
    spawn(session, effects, client, player)
}

/// Drive an existing session, applying `initial` effects first.
pub fn spawn<C, P>(
    session: PlaybackSession,
    initial: Vec<Effect>,
    client: Arc<C>,
    player: P,
) -> SessionHandle
where
    C: AnimeClient + 'static,
    P: Player,
{
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let actor = SessionActor {
        session,
        client,
        player,
        results: result_tx,
        events: event_tx,
        snapshot: snapshot_tx,
        tokens: HashMap::new(),
    };
    tokio::spawn(actor.run(initial, intent_rx, result_rx, event_rx));

    SessionHandle {
        intents: intent_tx,
        snapshot: snapshot_rx,
    }
}

struct SessionActor<C, P> {
    session: PlaybackSession,
    client: Arc<C>,
    player: P,
    results: mpsc::UnboundedSender<Message>,
    events: mpsc::UnboundedSender<(u64, PlayerEvent)>,
    snapshot: watch::Sender<SessionSnapshot>,
    tokens: HashMap<FetchStage, CancellationToken>,
}

impl<C, P> SessionActor<C, P>
where
    C: AnimeClient + 'static,
    P: Player,
{
    async fn run(
        mut self,
        initial: Vec<Effect>,
        mut intents: mpsc::UnboundedReceiver<Message>,
        mut results: mpsc::UnboundedReceiver<Message>,
        mut events: mpsc::UnboundedReceiver<(u64, PlayerEvent)>,
    ) {
        self.apply(initial);

        while !self.session.is_closed() {
            let message = tokio::select! {
                biased;
                intent = intents.recv() => intent.unwrap_or_else(|| {
                    tracing::debug!("all session handles dropped");
                    Message::Close
                }),
                Some(result) = results.recv() => result,
                Some((attachment, event)) = events.recv() => Message::Player { attachment, event },
            };

            let effects = self.session.update(message);
            self.apply(effects);
            self.snapshot.send_replace(self.session.snapshot());
        }

        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
        tracing::debug!(anime_id = self.session.anime().id, "session task finished");
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchEpisodes { ticket, anime_id } => {
                    let client = Arc::clone(&self.client);
                    self.spawn_fetch(ticket.stage, async move {
                        let result = client.fetch_episodes(anime_id).await;
                        Message::EpisodesFetched(ticket, result)
                    });
                }
                Effect::FindProviders {
                    ticket,
                    anime,
                    episode,
                } => {
                    let client = Arc::clone(&self.client);
                    self.spawn_fetch(ticket.stage, async move {
                        let result = client.find_providers(&anime, &episode).await;
                        Message::ProvidersFound(ticket, result)
                    });
                }
                Effect::FetchLinks {
                    ticket,
                    providers,
                    episode,
                } => {
                    let client = Arc::clone(&self.client);
                    self.spawn_fetch(ticket.stage, async move {
                        let fetches = providers
                            .iter()
                            .map(|provider| client.fetch_links(provider, &episode));
                        let result = merge_links(join_all(fetches).await);
                        Message::LinksFetched(ticket, result)
                    });
                }
                Effect::Cancel(stage) => {
                    if let Some(token) = self.tokens.remove(&stage) {
                        tracing::debug!(?stage, "cancelling fetch");
                        token.cancel();
                    }
                }
                Effect::Attach { attachment, links } => {
                    let events = PlayerEvents::new(attachment, self.events.clone());
                    self.player.attach(&links, events);
                }
                Effect::Play => self.player.play(),
                Effect::Pause => self.player.pause(),
                Effect::Seek(to) => self.player.seek(to),
                Effect::Detach => self.player.detach(),
            }
        }
    }

    /// Run `fetch` in its own task, superseding any fetch of the same stage.
    fn spawn_fetch<F>(&mut self, stage: FetchStage, fetch: F)
    where
        F: std::future::Future<Output = Message> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.insert(stage, token.clone()) {
            previous.cancel();
        }

        let results = self.results.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(?stage, "fetch cancelled");
                }
                message = fetch => {
                    // Receiver gone means the session already finished.
                    let _ = results.send(message);
                }
            }
        });
    }
}

/// Union the links from every provider.
///
/// Only fails when every provider failed; the error of the last one is kept.
pub fn merge_links(
    results: Vec<Result<BTreeSet<EpisodeLink>, FetchError>>,
) -> Result<BTreeSet<EpisodeLink>, FetchError> {
    let mut links = BTreeSet::new();
    let mut last_error = None;
    let mut any_ok = false;

    for result in results {
        match result {
            Ok(found) => {
                any_ok = true;
                links.extend(found);
            }
            Err(e) => {
                tracing::debug!(error = %e, "provider failed to resolve links");
                last_error = Some(e);
            }
        }
    }

    match (any_ok, last_error) {
        (true, _) => Ok(links),
        (false, Some(e)) => Err(e),
        (false, None) => Err(FetchError::NoProviders),
    }
}
