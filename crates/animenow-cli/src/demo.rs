//! Offline session backed by fixtures and a simulated player.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use animenow_api::traits::{
    EpisodeSource, FetchError, ProviderDiscovery, ProviderId, SourceResolver,
};
use animenow_core::models::{
    Anime, AnyEpisodeRepresentable, Audio, Episode, EpisodeLink, EpisodeRepresentable,
};
use animenow_player::{
    LoadingPhase, Player, PlayerEvent, PlayerEvents, RuntimeError, SessionSnapshot,
};

const EPISODE_LENGTH: Duration = Duration::from_secs(23 * 60);
/// Simulated playback advances this much per tick.
const TICK_ADVANCE: Duration = Duration::from_secs(30);
const TICK: Duration = Duration::from_millis(250);

/// Catalog and provider stand-in serving the demo episodes.
pub struct DemoClient {
    latency: Duration,
    no_providers: bool,
}

impl DemoClient {
    pub fn new(latency: Duration, no_providers: bool) -> Self {
        Self {
            latency,
            no_providers,
        }
    }
}

impl EpisodeSource for DemoClient {
    async fn fetch_episodes(
        &self,
        _anime_id: u64,
    ) -> Result<Vec<AnyEpisodeRepresentable>, FetchError> {
        tokio::time::sleep(self.latency).await;
        Ok(Episode::demo_episodes()
            .into_iter()
            .map(|e| e.erase())
            .collect())
    }
}

impl ProviderDiscovery for DemoClient {
    async fn find_providers(
        &self,
        _anime: &Anime,
        _episode: &AnyEpisodeRepresentable,
    ) -> Result<Vec<ProviderId>, FetchError> {
        tokio::time::sleep(self.latency).await;
        if self.no_providers {
            return Ok(Vec::new());
        }
        Ok(vec![ProviderId::new("gogoanime"), ProviderId::new("zoro")])
    }
}

impl SourceResolver for DemoClient {
    async fn fetch_links(
        &self,
        provider: &ProviderId,
        episode: &AnyEpisodeRepresentable,
    ) -> Result<BTreeSet<EpisodeLink>, FetchError> {
        tokio::time::sleep(self.latency).await;
        let id = format!("{provider}-{}", episode.number());
        Ok([Audio::Sub, Audio::Dub]
            .into_iter()
            .map(|audio| EpisodeLink::Stream {
                id: id.clone(),
                audio,
            })
            .collect())
    }
}

/// Player that pretends to stream by ticking a clock.
#[derive(Default)]
pub struct SimulatedPlayer {
    playing: Arc<AtomicBool>,
    position_ms: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedPlayer {
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.playing.store(false, Ordering::SeqCst);
    }
}

impl Player for SimulatedPlayer {
    fn attach(&mut self, links: &BTreeSet<EpisodeLink>, events: PlayerEvents) {
        self.stop();
        self.position_ms.store(0, Ordering::SeqCst);
        tracing::debug!(links = links.len(), attachment = events.attachment(), "simulated attach");

        let playing = Arc::clone(&self.playing);
        let position_ms = Arc::clone(&self.position_ms);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(TICK).await;
            if !events.emit(PlayerEvent::Ready) {
                return;
            }

            let total = EPISODE_LENGTH.as_millis() as u64;
            let mut ticker = tokio::time::interval(TICK);
            loop {
                ticker.tick().await;
                if !playing.load(Ordering::SeqCst) {
                    continue;
                }
                let step = TICK_ADVANCE.as_millis() as u64;
                let position = (position_ms.fetch_add(step, Ordering::SeqCst) + step).min(total);
                let alive = events.emit(PlayerEvent::TimeUpdated {
                    position: Duration::from_millis(position),
                    duration: EPISODE_LENGTH,
                });
                if !alive {
                    return;
                }
                if position >= total {
                    playing.store(false, Ordering::SeqCst);
                    events.emit(PlayerEvent::Ended);
                }
            }
        }));
    }

    fn play(&mut self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn pause(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn seek(&mut self, to: Duration) {
        self.position_ms
            .store(to.as_millis() as u64, Ordering::SeqCst);
    }

    fn detach(&mut self) {
        self.stop();
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Position and duration, or `--:--` for both while the duration is unknown.
fn format_progress(position: Duration, duration: Duration) -> String {
    if duration.is_zero() {
        return "--:-- / --:--".to_string();
    }
    format!("{} / {}", format_time(position), format_time(duration))
}

/// One-line status of a session.
pub fn describe(snapshot: &SessionSnapshot) -> String {
    let status = if let Some(error) = snapshot.error_message() {
        error
    } else if let Some(loading) = snapshot.loading_message() {
        loading.to_string()
    } else if snapshot.loading == LoadingPhase::Buffering {
        "Buffering".to_string()
    } else {
        format!(
            "{:?} {}",
            snapshot.playback,
            format_progress(snapshot.position, snapshot.duration)
        )
    };

    format!(
        "{} - Episode {} ({}): {}",
        snapshot.anime_title,
        snapshot.selected_episode,
        snapshot.selected_title.as_deref().unwrap_or("?"),
        status
    )
}

/// Drive a demo session, printing every status change for `watch_for`.
pub async fn run(episode: u32, no_providers: bool, watch_for: Duration) -> Result<(), RuntimeError> {
    let client = Arc::new(DemoClient::new(Duration::from_millis(300), no_providers));
    let placeholders = Episode::placeholders(2)
        .into_iter()
        .map(|e| e.erase())
        .collect();
    let mut handle = animenow_player::start(
        Anime::naruto_shippuden(),
        placeholders,
        episode,
        client,
        SimulatedPlayer::default(),
    );

    let mut last = describe(&handle.snapshot());
    println!("{last}");

    let deadline = tokio::time::sleep(watch_for);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = handle.changed() => {
                let snapshot = changed?;
                let line = describe(&snapshot);
                if line != last {
                    println!("{line}");
                    last = line;
                }
                if !snapshot.error.is_none() {
                    break;
                }
            }
        }
    }

    handle.close()?;
    handle.wait_for(|s| s.closed).await?;
    Ok(())
}
