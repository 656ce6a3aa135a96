pub mod player;
pub mod runtime;
pub mod session;
pub mod state;

pub use player::{Player, PlayerEvent, PlayerEvents};
pub use runtime::{merge_links, spawn, start, RuntimeError, SessionHandle};
pub use session::{Effect, FetchStage, FetchTicket, Message, PlaybackSession, SessionSnapshot};
pub use state::{ErrorPhase, LoadingPhase, Phases, PlaybackPhase, PlayerError};
