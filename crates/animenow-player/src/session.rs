//! Playback session state machine.
//!
//! [`PlaybackSession::update`] folds one [`Message`] into the state and
//! returns the [`Effect`]s the runtime must carry out. It never performs I/O,
//! so every transition is testable without a runtime.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use serde::Serialize;

use animenow_api::traits::{FetchError, ProviderId};
use animenow_core::models::{Anime, AnyEpisodeRepresentable, EpisodeLink, EpisodeRepresentable};

use crate::player::PlayerEvent;
use crate::state::{ErrorPhase, LoadingPhase, PlaybackPhase, Phases, PlayerError};

/// Independent fetch stages. At most one fetch per stage is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStage {
    Episodes,
    Providers,
    Sources,
}

impl FetchStage {
    pub const ALL: [FetchStage; 3] = [Self::Episodes, Self::Providers, Self::Sources];
}

/// Token a fetch result must present to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub stage: FetchStage,
    pub generation: u64,
    /// Episode the fetch was issued for. `None` for the episode list.
    pub episode: Option<u32>,
}

/// Inputs to the session: user intents, fetch results and player events.
#[derive(Debug, Clone)]
pub enum Message {
    SelectEpisode(u32),
    Retry,
    TogglePlayback,
    StartSeeking,
    /// Scrub position as a fraction of the duration.
    SlidingSeeker(f64),
    DoneSeeking,
    Close,
    EpisodesFetched(FetchTicket, Result<Vec<AnyEpisodeRepresentable>, FetchError>),
    ProvidersFound(FetchTicket, Result<Vec<ProviderId>, FetchError>),
    LinksFetched(FetchTicket, Result<BTreeSet<EpisodeLink>, FetchError>),
    Player { attachment: u64, event: PlayerEvent },
}

/// Side effects requested by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchEpisodes {
        ticket: FetchTicket,
        anime_id: u64,
    },
    FindProviders {
        ticket: FetchTicket,
        anime: Anime,
        episode: AnyEpisodeRepresentable,
    },
    FetchLinks {
        ticket: FetchTicket,
        providers: Vec<ProviderId>,
        episode: AnyEpisodeRepresentable,
    },
    Cancel(FetchStage),
    Attach {
        attachment: u64,
        links: BTreeSet<EpisodeLink>,
    },
    Play,
    Pause,
    Seek(Duration),
    Detach,
}

#[derive(Debug, Default)]
struct Tickets {
    episodes: Option<FetchTicket>,
    providers: Option<FetchTicket>,
    sources: Option<FetchTicket>,
}

impl Tickets {
    fn slot(&mut self, stage: FetchStage) -> &mut Option<FetchTicket> {
        match stage {
            FetchStage::Episodes => &mut self.episodes,
            FetchStage::Providers => &mut self.providers,
            FetchStage::Sources => &mut self.sources,
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub anime_id: u64,
    pub anime_title: String,
    pub episode_count: usize,
    pub selected_episode: u32,
    pub selected_title: Option<String>,
    pub links: BTreeSet<EpisodeLink>,
    pub loading: LoadingPhase,
    pub error: ErrorPhase,
    pub playback: PlaybackPhase,
    pub position: Duration,
    pub duration: Duration,
    pub player_error: Option<PlayerError>,
    pub closed: bool,
}

impl SessionSnapshot {
    pub fn loading_message(&self) -> Option<&'static str> {
        self.loading.message()
    }

    pub fn error_message(&self) -> Option<String> {
        (!self.error.is_none()).then(|| self.error.to_string())
    }

    /// Playback progress in `0.0..=1.0`, zero while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            0.0
        } else {
            (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        }
    }
}

/// State of "watch episode E of anime A".
#[derive(Debug)]
pub struct PlaybackSession {
    anime: Anime,
    episodes: Vec<AnyEpisodeRepresentable>,
    episodes_loaded: bool,
    selected: u32,
    providers: Vec<ProviderId>,
    links: BTreeSet<EpisodeLink>,
    position: Duration,
    duration: Duration,
    phases: Phases,
    resume_phase: PlaybackPhase,
    player_error: Option<PlayerError>,
    tickets: Tickets,
    generation: u64,
    attachment: Option<u64>,
    /// Set from the first attach until close. `attachment` only filters events.
    player_attached: bool,
    closed: bool,
}

impl PlaybackSession {
    /// Create a session and the effects that start it.
    ///
    /// `episodes` is shown until the real list arrives (placeholders, or a
    /// list the caller already has).
    pub fn new(
        anime: Anime,
        episodes: Vec<AnyEpisodeRepresentable>,
        selected: u32,
    ) -> (Self, Vec<Effect>) {
        let mut session = Self {
            anime,
            episodes,
            episodes_loaded: false,
            selected,
            providers: Vec::new(),
            links: BTreeSet::new(),
            position: Duration::ZERO,
            duration: Duration::ZERO,
            phases: Phases::default(),
            resume_phase: PlaybackPhase::Idle,
            player_error: None,
            tickets: Tickets::default(),
            generation: 0,
            attachment: None,
            player_attached: false,
            closed: false,
        };
        let effects = session.start_episode_fetch();
        (session, effects)
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn anime(&self) -> &Anime {
        &self.anime
    }

    pub fn episodes(&self) -> &[AnyEpisodeRepresentable] {
        &self.episodes
    }

    pub fn selected_number(&self) -> u32 {
        self.selected
    }

    pub fn selected_episode(&self) -> Option<&AnyEpisodeRepresentable> {
        self.episodes.iter().find(|e| e.number() == self.selected)
    }

    /// Links resolved for the selected episode.
    pub fn links(&self) -> &BTreeSet<EpisodeLink> {
        &self.links
    }

    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    pub fn phases(&self) -> Phases {
        self.phases
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn player_error(&self) -> Option<&PlayerError> {
        self.player_error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            anime_id: self.anime.id,
            anime_title: self.anime.title.clone(),
            episode_count: self.episodes.len(),
            selected_episode: self.selected,
            selected_title: self.selected_episode().map(|e| e.title().to_string()),
            links: self.links.clone(),
            loading: self.phases.loading(),
            error: self.phases.error(),
            playback: self.phases.playback(),
            position: self.position,
            duration: self.duration,
            player_error: self.player_error.clone(),
            closed: self.closed,
        }
    }

    // ── Update ───────────────────────────────────────────────────

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        if self.closed {
            tracing::debug!(?message, "session closed, ignoring message");
            return Vec::new();
        }

        match message {
            Message::SelectEpisode(number) => self.select_episode(number),
            Message::Retry => self.retry(),
            Message::TogglePlayback => self.toggle_playback(),
            Message::StartSeeking => {
                let current = self.phases.playback();
                if matches!(current, PlaybackPhase::Playing | PlaybackPhase::Paused) {
                    self.resume_phase = current;
                    self.phases.set_playback(PlaybackPhase::Seeking);
                }
                Vec::new()
            }
            Message::SlidingSeeker(progress) => {
                if self.phases.playback() == PlaybackPhase::Seeking && progress.is_finite() {
                    self.position = self.duration.mul_f64(progress.clamp(0.0, 1.0));
                }
                Vec::new()
            }
            Message::DoneSeeking => {
                if self.phases.playback() != PlaybackPhase::Seeking {
                    return Vec::new();
                }
                self.phases.set_playback(self.resume_phase);
                vec![Effect::Seek(self.position)]
            }
            Message::Close => self.close(),
            Message::EpisodesFetched(ticket, result) => {
                if !self.accept(ticket, LoadingPhase::FetchingEpisodes) {
                    return Vec::new();
                }
                self.on_episodes(result)
            }
            Message::ProvidersFound(ticket, result) => {
                if !self.accept(ticket, LoadingPhase::FetchingSources) {
                    return Vec::new();
                }
                self.on_providers(result)
            }
            Message::LinksFetched(ticket, result) => {
                if !self.accept(ticket, LoadingPhase::FetchingSources) {
                    return Vec::new();
                }
                self.on_links(result)
            }
            Message::Player { attachment, event } => {
                if self.attachment != Some(attachment) {
                    tracing::debug!(attachment, ?event, "dropping event from stale attachment");
                    return Vec::new();
                }
                self.on_player_event(event)
            }
        }
    }

    /// Check a result's ticket against the current expectations and retire it.
    fn accept(&mut self, ticket: FetchTicket, expected: LoadingPhase) -> bool {
        let slot = self.tickets.slot(ticket.stage);
        let current = *slot == Some(ticket);
        let same_episode = ticket.episode.map_or(true, |n| n == self.selected);
        let in_phase = self.phases.loading() == expected;

        if current && same_episode && in_phase {
            *slot = None;
            true
        } else {
            tracing::debug!(
                stage = ?ticket.stage,
                generation = ticket.generation,
                episode = ?ticket.episode,
                "discarding stale result"
            );
            false
        }
    }

    fn issue(&mut self, stage: FetchStage) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            stage,
            generation: self.generation,
            episode: (stage != FetchStage::Episodes).then_some(self.selected),
        };
        *self.tickets.slot(stage) = Some(ticket);
        ticket
    }

    fn start_episode_fetch(&mut self) -> Vec<Effect> {
        self.phases.set_loading(LoadingPhase::FetchingEpisodes);
        let ticket = self.issue(FetchStage::Episodes);
        tracing::debug!(anime_id = self.anime.id, "fetching episodes");
        vec![Effect::FetchEpisodes {
            ticket,
            anime_id: self.anime.id,
        }]
    }

    fn start_discovery(&mut self) -> Vec<Effect> {
        self.providers.clear();
        self.links.clear();
        let Some(episode) = self.selected_episode().cloned() else {
            tracing::warn!(episode = self.selected, "selected episode missing from collection");
            self.phases.fail(ErrorPhase::FailedToFindProviders);
            return Vec::new();
        };
        self.phases.set_loading(LoadingPhase::FetchingSources);
        let ticket = self.issue(FetchStage::Providers);
        tracing::debug!(episode = self.selected, "discovering providers");
        vec![Effect::FindProviders {
            ticket,
            anime: self.anime.clone(),
            episode,
        }]
    }

    fn start_source_fetch(&mut self) -> Vec<Effect> {
        let Some(episode) = self.selected_episode().cloned() else {
            self.phases.fail(ErrorPhase::FailedToLoadSources);
            return Vec::new();
        };
        self.phases.set_loading(LoadingPhase::FetchingSources);
        let ticket = self.issue(FetchStage::Sources);
        tracing::debug!(
            episode = self.selected,
            providers = self.providers.len(),
            "fetching sources"
        );
        vec![Effect::FetchLinks {
            ticket,
            providers: self.providers.clone(),
            episode,
        }]
    }

    fn on_episodes(&mut self, result: Result<Vec<AnyEpisodeRepresentable>, FetchError>) -> Vec<Effect> {
        let fetched = match result {
            Ok(episodes) => episodes,
            Err(e) => {
                tracing::warn!(error = %e, anime_id = self.anime.id, "episode fetch failed");
                self.phases.fail(ErrorPhase::FailedToLoadEpisodes);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let episodes: Vec<_> = fetched
            .into_iter()
            .filter(|e| {
                let fresh = seen.insert(e.number());
                if !fresh {
                    tracing::warn!(episode = e.number(), "duplicate episode number dropped");
                }
                fresh
            })
            .collect();

        let Some(first) = episodes.first().map(|e| e.number()) else {
            tracing::warn!(anime_id = self.anime.id, "episode list is empty");
            self.phases.fail(ErrorPhase::FailedToLoadEpisodes);
            return Vec::new();
        };

        self.episodes = episodes;
        self.episodes_loaded = true;
        if self.selected_episode().is_none() {
            tracing::debug!(requested = self.selected, first, "selected episode not found, using first");
            self.selected = first;
        }
        self.start_discovery()
    }

    fn on_providers(&mut self, result: Result<Vec<ProviderId>, FetchError>) -> Vec<Effect> {
        match result {
            Ok(providers) if !providers.is_empty() => {
                self.providers = providers;
                self.start_source_fetch()
            }
            Ok(_) => {
                tracing::warn!(episode = self.selected, "no providers found");
                self.phases.fail(ErrorPhase::FailedToFindProviders);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, episode = self.selected, "provider discovery failed");
                self.phases.fail(ErrorPhase::FailedToFindProviders);
                Vec::new()
            }
        }
    }

    fn on_links(&mut self, result: Result<BTreeSet<EpisodeLink>, FetchError>) -> Vec<Effect> {
        match result {
            Ok(links) if !links.is_empty() => {
                self.links = links;
                self.phases.set_loading(LoadingPhase::Buffering);
                self.generation += 1;
                self.attachment = Some(self.generation);
                self.player_attached = true;
                tracing::debug!(episode = self.selected, links = self.links.len(), "attaching player");
                vec![Effect::Attach {
                    attachment: self.generation,
                    links: self.links.clone(),
                }]
            }
            Ok(_) => {
                tracing::warn!(episode = self.selected, "providers returned no links");
                self.phases.fail(ErrorPhase::FailedToLoadSources);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, episode = self.selected, "source fetch failed");
                self.phases.fail(ErrorPhase::FailedToLoadSources);
                Vec::new()
            }
        }
    }

    fn on_player_event(&mut self, event: PlayerEvent) -> Vec<Effect> {
        match event {
            PlayerEvent::Ready => {
                if self.phases.loading() != LoadingPhase::Buffering {
                    return Vec::new();
                }
                self.phases.set_loading(LoadingPhase::None);
                if self.phases.playback() == PlaybackPhase::Idle {
                    self.phases.set_playback(PlaybackPhase::Playing);
                    return vec![Effect::Play];
                }
                Vec::new()
            }
            PlayerEvent::Buffering => {
                if self.phases.playback() == PlaybackPhase::Playing {
                    self.phases.set_loading(LoadingPhase::Buffering);
                }
                Vec::new()
            }
            PlayerEvent::TimeUpdated { position, duration } => {
                if self.phases.playback() != PlaybackPhase::Seeking {
                    self.position = position;
                    self.duration = duration;
                }
                Vec::new()
            }
            PlayerEvent::Ended => {
                match self.phases.playback() {
                    PlaybackPhase::Seeking => return Vec::new(),
                    PlaybackPhase::Playing => self.phases.set_playback(PlaybackPhase::Paused),
                    PlaybackPhase::Idle | PlaybackPhase::Paused => {}
                }
                self.position = self.duration;
                Vec::new()
            }
            PlayerEvent::Failed(message) => {
                tracing::warn!(%message, episode = self.selected, "player failed");
                self.player_error = Some(PlayerError(message));
                if self.phases.loading() == LoadingPhase::Buffering {
                    self.phases.set_loading(LoadingPhase::None);
                }
                Vec::new()
            }
        }
    }

    fn select_episode(&mut self, number: u32) -> Vec<Effect> {
        if number == self.selected {
            return Vec::new();
        }
        if !self.episodes_loaded {
            // Picked up once the episode list arrives.
            self.selected = number;
            return Vec::new();
        }
        if !self.episodes.iter().any(|e| e.number() == number) {
            tracing::warn!(episode = number, "ignoring selection of unknown episode");
            return Vec::new();
        }

        tracing::debug!(from = self.selected, to = number, "switching episode");
        let mut effects = vec![Effect::Cancel(FetchStage::Providers), Effect::Cancel(FetchStage::Sources)];
        self.tickets.providers = None;
        self.tickets.sources = None;

        if self.phases.playback() != PlaybackPhase::Idle {
            effects.push(Effect::Pause);
        }
        self.phases.set_playback(PlaybackPhase::Idle);
        self.phases.clear_error();
        self.attachment = None;
        self.player_error = None;
        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;
        self.selected = number;

        effects.extend(self.start_discovery());
        effects
    }

    fn retry(&mut self) -> Vec<Effect> {
        match self.phases.error() {
            ErrorPhase::None => Vec::new(),
            ErrorPhase::FailedToLoadEpisodes => self.start_episode_fetch(),
            ErrorPhase::FailedToFindProviders => self.start_discovery(),
            ErrorPhase::FailedToLoadSources if self.providers.is_empty() => self.start_discovery(),
            ErrorPhase::FailedToLoadSources => self.start_source_fetch(),
        }
    }

    fn toggle_playback(&mut self) -> Vec<Effect> {
        match self.phases.playback() {
            PlaybackPhase::Playing => {
                self.phases.set_playback(PlaybackPhase::Paused);
                vec![Effect::Pause]
            }
            PlaybackPhase::Paused => {
                self.phases.set_playback(PlaybackPhase::Playing);
                vec![Effect::Play]
            }
            PlaybackPhase::Idle | PlaybackPhase::Seeking => Vec::new(),
        }
    }

    fn close(&mut self) -> Vec<Effect> {
        tracing::debug!(anime_id = self.anime.id, "closing session");
        self.closed = true;
        self.tickets = Tickets::default();
        self.phases.set_loading(LoadingPhase::None);

        let mut effects: Vec<Effect> = FetchStage::ALL.into_iter().map(Effect::Cancel).collect();
        self.attachment = None;
        if std::mem::take(&mut self.player_attached) {
            effects.push(Effect::Detach);
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use animenow_core::models::{Audio, Episode};

    use super::*;

    fn demo_session() -> (PlaybackSession, Vec<Effect>) {
        let episodes = Episode::placeholders(3)
            .into_iter()
            .map(|e| e.erase())
            .collect();
        PlaybackSession::new(Anime::naruto_shippuden(), episodes, 1)
    }

    fn fetched_episodes() -> Vec<AnyEpisodeRepresentable> {
        (1..=3)
            .map(|n| {
                let mut e = Episode::placeholder(n);
                e.title = format!("Episode {n}");
                e.erase()
            })
            .collect()
    }

    fn links(provider: &str) -> BTreeSet<EpisodeLink> {
        [EpisodeLink::Stream {
            id: provider.into(),
            audio: Audio::Sub,
        }]
        .into_iter()
        .collect()
    }

    fn ticket_of(effects: &[Effect]) -> FetchTicket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchEpisodes { ticket, .. }
                | Effect::FindProviders { ticket, .. }
                | Effect::FetchLinks { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .expect("effects contain a fetch")
    }

    fn attachment_of(effects: &[Effect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Attach { attachment, .. } => Some(*attachment),
                _ => None,
            })
            .expect("effects contain an attach")
    }

    fn assert_exclusive(session: &PlaybackSession) {
        let phases = session.phases();
        assert!(
            phases.loading().is_none() || phases.error().is_none(),
            "loading {:?} and error {:?} both set",
            phases.loading(),
            phases.error()
        );
    }

    /// Drive a session all the way to `Playing`; returns the attachment.
    fn playing_session() -> (PlaybackSession, u64) {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        let effects = session.update(Message::ProvidersFound(
            ticket_of(&effects),
            Ok(vec![ProviderId::new("zoro")]),
        ));
        let effects = session.update(Message::LinksFetched(ticket_of(&effects), Ok(links("zoro"))));
        let attachment = attachment_of(&effects);
        let effects = session.update(Message::Player {
            attachment,
            event: PlayerEvent::Ready,
        });
        assert_eq!(effects, vec![Effect::Play]);
        (session, attachment)
    }

    #[test]
    fn test_initial_state() {
        let (session, effects) = demo_session();
        let phases = session.phases();
        assert_eq!(phases.loading(), LoadingPhase::FetchingEpisodes);
        assert_eq!(phases.error(), ErrorPhase::None);
        assert_eq!(phases.playback(), PlaybackPhase::Idle);
        assert!(matches!(
            effects.as_slice(),
            [Effect::FetchEpisodes { anime_id: 1735, .. }]
        ));
    }

    #[test]
    fn test_happy_path_to_playing() {
        let (session, _) = playing_session();
        let phases = session.phases();
        assert_eq!(phases.loading(), LoadingPhase::None);
        assert_eq!(phases.error(), ErrorPhase::None);
        assert_eq!(phases.playback(), PlaybackPhase::Playing);
        assert_eq!(session.links(), &links("zoro"));
        assert_eq!(session.selected_episode().map(|e| e.title()), Some("Episode 1"));
    }

    #[test]
    fn test_episode_fetch_failure_then_retry() {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Err(FetchError::Network("offline".into())),
        ));
        assert!(effects.is_empty());
        assert_eq!(session.phases().loading(), LoadingPhase::None);
        assert_eq!(session.phases().error(), ErrorPhase::FailedToLoadEpisodes);

        let effects = session.update(Message::Retry);
        assert!(matches!(effects.as_slice(), [Effect::FetchEpisodes { .. }]));
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingEpisodes);
        assert_eq!(session.phases().error(), ErrorPhase::None);
    }

    #[test]
    fn test_empty_episode_list_is_failure() {
        let (mut session, effects) = demo_session();
        session.update(Message::EpisodesFetched(ticket_of(&effects), Ok(Vec::new())));
        assert_eq!(session.phases().error(), ErrorPhase::FailedToLoadEpisodes);
        assert_exclusive(&session);
    }

    #[test]
    fn test_episodes_deduplicated_and_missing_selection_falls_back() {
        let (mut session, effects) = demo_session();
        session.update(Message::SelectEpisode(42));
        let mut episodes = fetched_episodes();
        episodes.push(Episode::placeholder(2).erase());
        let effects = session.update(Message::EpisodesFetched(ticket_of(&effects), Ok(episodes)));

        assert_eq!(session.episodes().len(), 3);
        assert_eq!(session.selected_number(), 1);
        assert!(matches!(effects.as_slice(), [Effect::FindProviders { .. }]));
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);
    }

    #[test]
    fn test_selection_during_episode_fetch_is_kept() {
        let (mut session, effects) = demo_session();
        assert!(session.update(Message::SelectEpisode(3)).is_empty());
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        assert_eq!(session.selected_number(), 3);
        assert_eq!(ticket_of(&effects).episode, Some(3));
    }

    #[test]
    fn test_no_providers_then_select_discards_stale_result() {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        session.update(Message::ProvidersFound(ticket_of(&effects), Ok(Vec::new())));
        assert_eq!(session.phases().error(), ErrorPhase::FailedToFindProviders);
        assert_eq!(session.phases().loading(), LoadingPhase::None);

        // Retry for episode 1 goes out, then the user switches to episode 2.
        let retry = session.update(Message::Retry);
        let stale = ticket_of(&retry);
        let effects = session.update(Message::SelectEpisode(2));
        assert!(effects.contains(&Effect::Cancel(FetchStage::Providers)));
        assert_eq!(session.phases().error(), ErrorPhase::None);
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);
        let fresh = ticket_of(&effects);
        assert_eq!(fresh.episode, Some(2));

        // Late result for episode 1 is a no-op.
        let late = session.update(Message::ProvidersFound(stale, Ok(vec![ProviderId::new("old")])));
        assert!(late.is_empty());
        assert!(session.providers().is_empty());
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);

        let effects = session.update(Message::ProvidersFound(fresh, Ok(vec![ProviderId::new("new")])));
        assert_eq!(session.providers(), &[ProviderId::new("new")]);
        assert_eq!(ticket_of(&effects).episode, Some(2));
    }

    #[test]
    fn test_latest_selection_wins_regardless_of_completion_order() {
        let (mut session, effects) = demo_session();
        let first = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        let to_two = session.update(Message::SelectEpisode(2));
        let to_three = session.update(Message::SelectEpisode(3));

        // Completions arrive newest first, then the older ones.
        let effects = session.update(Message::ProvidersFound(
            ticket_of(&to_three),
            Ok(vec![ProviderId::new("three")]),
        ));
        let sources = ticket_of(&effects);
        assert!(session
            .update(Message::ProvidersFound(ticket_of(&to_two), Ok(vec![ProviderId::new("two")])))
            .is_empty());
        assert!(session
            .update(Message::ProvidersFound(ticket_of(&first), Ok(vec![ProviderId::new("one")])))
            .is_empty());

        assert_eq!(session.selected_number(), 3);
        assert_eq!(session.providers(), &[ProviderId::new("three")]);

        session.update(Message::LinksFetched(sources, Ok(links("three"))));
        assert_eq!(session.phases().loading(), LoadingPhase::Buffering);
        assert_eq!(session.links(), &links("three"));
    }

    #[test]
    fn test_superseded_ticket_same_stage_is_ignored() {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        let first = ticket_of(&effects);
        session.update(Message::ProvidersFound(first, Err(FetchError::NoProviders)));
        let retried = ticket_of(&session.update(Message::Retry));
        assert_ne!(first, retried);

        // A duplicate delivery of the first result cannot be applied again.
        assert!(session
            .update(Message::ProvidersFound(first, Ok(vec![ProviderId::new("dup")])))
            .is_empty());
        assert!(session.providers().is_empty());
    }

    #[test]
    fn test_source_failure_retry_reuses_providers() {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        let effects = session.update(Message::ProvidersFound(
            ticket_of(&effects),
            Ok(vec![ProviderId::new("zoro")]),
        ));
        session.update(Message::LinksFetched(
            ticket_of(&effects),
            Err(FetchError::Network("timeout".into())),
        ));
        assert_eq!(session.phases().error(), ErrorPhase::FailedToLoadSources);
        assert_exclusive(&session);

        let effects = session.update(Message::Retry);
        match effects.as_slice() {
            [Effect::FetchLinks { providers, .. }] => {
                assert_eq!(providers, &vec![ProviderId::new("zoro")]);
            }
            other => panic!("unexpected effects {other:?}"),
        }
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);
        assert_eq!(session.phases().error(), ErrorPhase::None);
    }

    #[test]
    fn test_empty_links_is_source_failure() {
        let (mut session, effects) = demo_session();
        let effects = session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Ok(fetched_episodes()),
        ));
        let effects = session.update(Message::ProvidersFound(
            ticket_of(&effects),
            Ok(vec![ProviderId::new("zoro")]),
        ));
        session.update(Message::LinksFetched(ticket_of(&effects), Ok(BTreeSet::new())));
        assert_eq!(session.phases().error(), ErrorPhase::FailedToLoadSources);
    }

    #[test]
    fn test_retry_without_error_is_noop() {
        let (mut session, _) = demo_session();
        assert!(session.update(Message::Retry).is_empty());
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingEpisodes);
    }

    #[test]
    fn test_toggle_three_times_from_playing() {
        let (mut session, _) = playing_session();
        let before = session.snapshot();

        assert_eq!(session.update(Message::TogglePlayback), vec![Effect::Pause]);
        assert_eq!(session.update(Message::TogglePlayback), vec![Effect::Play]);
        assert_eq!(session.update(Message::TogglePlayback), vec![Effect::Pause]);

        let after = session.snapshot();
        assert_eq!(after.playback, PlaybackPhase::Paused);
        assert_eq!(
            SessionSnapshot {
                playback: before.playback,
                ..after
            },
            before
        );
    }

    #[test]
    fn test_toggle_while_idle_is_noop() {
        let (mut session, _) = demo_session();
        assert!(session.update(Message::TogglePlayback).is_empty());
        assert_eq!(session.phases().playback(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_seeking_round_trip() {
        let (mut session, attachment) = playing_session();
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::TimeUpdated {
                position: Duration::from_secs(10),
                duration: Duration::from_secs(100),
            },
        });

        session.update(Message::StartSeeking);
        assert_eq!(session.phases().playback(), PlaybackPhase::Seeking);
        session.update(Message::SlidingSeeker(0.5));
        // Time updates do not fight the scrubber.
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::TimeUpdated {
                position: Duration::from_secs(11),
                duration: Duration::from_secs(100),
            },
        });
        assert_eq!(session.position(), Duration::from_secs(50));

        let effects = session.update(Message::DoneSeeking);
        assert_eq!(effects, vec![Effect::Seek(Duration::from_secs(50))]);
        assert_eq!(session.phases().playback(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_seeking_from_paused_resumes_paused() {
        let (mut session, _) = playing_session();
        session.update(Message::TogglePlayback);
        session.update(Message::StartSeeking);
        session.update(Message::SlidingSeeker(f64::NAN));
        session.update(Message::DoneSeeking);
        assert_eq!(session.phases().playback(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_player_buffering_and_recovery() {
        let (mut session, attachment) = playing_session();
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::Buffering,
        });
        assert_eq!(session.phases().loading(), LoadingPhase::Buffering);
        assert_eq!(session.links(), &links("zoro"));

        let effects = session.update(Message::Player {
            attachment,
            event: PlayerEvent::Ready,
        });
        assert!(effects.is_empty());
        assert_eq!(session.phases().loading(), LoadingPhase::None);
        assert_eq!(session.phases().playback(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_player_failure_is_surfaced_without_touching_playback() {
        let (mut session, attachment) = playing_session();
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::Failed("decoder crashed".into()),
        });
        assert_eq!(
            session.player_error(),
            Some(&PlayerError("decoder crashed".into()))
        );
        assert_eq!(session.phases().playback(), PlaybackPhase::Playing);
        assert_eq!(session.phases().error(), ErrorPhase::None);
    }

    #[test]
    fn test_player_ended_pauses() {
        let (mut session, attachment) = playing_session();
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::TimeUpdated {
                position: Duration::from_secs(1),
                duration: Duration::from_secs(1400),
            },
        });
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::Ended,
        });
        assert_eq!(session.phases().playback(), PlaybackPhase::Paused);
        assert_eq!(session.position(), Duration::from_secs(1400));
        assert!((session.snapshot().progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_switching_episode_resets_playback_and_drops_old_player_events() {
        let (mut session, attachment) = playing_session();
        let effects = session.update(Message::SelectEpisode(2));
        assert!(effects.contains(&Effect::Pause));
        assert!(effects.contains(&Effect::Cancel(FetchStage::Sources)));
        assert_eq!(session.phases().playback(), PlaybackPhase::Idle);
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);
        assert!(session.links().is_empty());

        let ignored = session.update(Message::Player {
            attachment,
            event: PlayerEvent::Buffering,
        });
        assert!(ignored.is_empty());
        assert_eq!(session.phases().loading(), LoadingPhase::FetchingSources);
    }

    #[test]
    fn test_selecting_unknown_or_same_episode_is_noop() {
        let (mut session, _) = playing_session();
        assert!(session.update(Message::SelectEpisode(1)).is_empty());
        assert!(session.update(Message::SelectEpisode(99)).is_empty());
        assert_eq!(session.phases().playback(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_close_cancels_and_detaches() {
        let (mut session, attachment) = playing_session();
        let effects = session.update(Message::Close);
        assert_eq!(
            effects,
            vec![
                Effect::Cancel(FetchStage::Episodes),
                Effect::Cancel(FetchStage::Providers),
                Effect::Cancel(FetchStage::Sources),
                Effect::Detach,
            ]
        );
        assert!(session.is_closed());
        assert!(session
            .update(Message::Player {
                attachment,
                event: PlayerEvent::Ended,
            })
            .is_empty());
        assert!(session.update(Message::Retry).is_empty());
    }

    #[test]
    fn test_close_after_switching_episode_detaches() {
        let (mut session, _) = playing_session();
        session.update(Message::SelectEpisode(2));
        let effects = session.update(Message::Close);
        assert!(effects.contains(&Effect::Detach));
    }

    #[test]
    fn test_close_after_failed_switch_detaches() {
        let (mut session, _) = playing_session();
        let effects = session.update(Message::SelectEpisode(2));
        session.update(Message::ProvidersFound(
            ticket_of(&effects),
            Err(FetchError::Network("offline".into())),
        ));
        assert_eq!(session.phases().error(), ErrorPhase::FailedToFindProviders);

        let effects = session.update(Message::Close);
        assert_eq!(effects.iter().filter(|e| **e == Effect::Detach).count(), 1);
    }

    #[test]
    fn test_ended_while_seeking_keeps_scrub_position() {
        let (mut session, attachment) = playing_session();
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::TimeUpdated {
                position: Duration::from_secs(90),
                duration: Duration::from_secs(100),
            },
        });
        session.update(Message::StartSeeking);
        session.update(Message::SlidingSeeker(0.25));
        session.update(Message::Player {
            attachment,
            event: PlayerEvent::Ended,
        });
        assert_eq!(session.position(), Duration::from_secs(25));
        assert_eq!(session.phases().playback(), PlaybackPhase::Seeking);

        let effects = session.update(Message::DoneSeeking);
        assert_eq!(effects, vec![Effect::Seek(Duration::from_secs(25))]);
        assert_eq!(session.phases().playback(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_close_before_attach_does_not_detach() {
        let (mut session, _) = demo_session();
        let effects = session.update(Message::Close);
        assert!(!effects.contains(&Effect::Detach));
        assert!(session.snapshot().closed);
    }

    #[test]
    fn test_snapshot_messages() {
        let (mut session, effects) = demo_session();
        assert_eq!(session.snapshot().loading_message(), Some("Loading Episodes"));
        assert_eq!(session.snapshot().error_message(), None);

        session.update(Message::EpisodesFetched(
            ticket_of(&effects),
            Err(FetchError::Network("x".into())),
        ));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.loading_message(), None);
        assert_eq!(snapshot.error_message().as_deref(), Some("Failed to load episodes"));
    }
}
