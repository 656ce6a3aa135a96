use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::image::ImageSize;

// ── Links ────────────────────────────────────────────────────────

/// Audio track of a streamed episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audio {
    Sub,
    Dub,
    Custom(String),
}

impl Audio {
    /// Anything other than the original-language subtitled track counts as a dub.
    pub fn is_dub(&self) -> bool {
        *self != Self::Sub
    }
}

impl fmt::Display for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sub => f.write_str("Sub"),
            Self::Dub => f.write_str("Dub"),
            Self::Custom(custom) => f.write_str(custom),
        }
    }
}

/// A playable reference to an episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpisodeLink {
    /// Provider-backed stream with a specific audio track.
    Stream { id: String, audio: Audio },
    /// Downloaded file.
    Offline { url: Url },
}

impl EpisodeLink {
    pub fn id(&self) -> String {
        match self {
            Self::Stream { id, audio } => format!("{id}-{audio}"),
            Self::Offline { url } => url.to_string(),
        }
    }

    pub fn audio(&self) -> Audio {
        match self {
            Self::Stream { audio, .. } => audio.clone(),
            Self::Offline { .. } => Audio::Sub,
        }
    }
}

impl fmt::Display for EpisodeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.audio())
    }
}

// ── Representable ────────────────────────────────────────────────

/// Shared capability set of every episode-like value.
///
/// Concrete types compare by value among themselves. To mix episodes from
/// different origins in one collection, [`erase`](Self::erase) them into
/// [`AnyEpisodeRepresentable`].
pub trait EpisodeRepresentable:
    fmt::Debug + Clone + PartialEq + Hash + Send + Sync + 'static
{
    /// Episode number, also the identity within a collection.
    fn number(&self) -> u32;
    fn title(&self) -> &str;
    fn thumbnail(&self) -> Option<&ImageSize>;
    fn is_filler(&self) -> bool;
    fn links(&self) -> &BTreeSet<EpisodeLink>;

    /// Value equality against another representable.
    ///
    /// Returns `false` whenever `other` is a different concrete type.
    fn is_equal_to<E: EpisodeRepresentable>(&self, other: &E) -> bool {
        (other as &dyn Any)
            .downcast_ref::<Self>()
            .is_some_and(|other| self == other)
    }

    fn erase(self) -> AnyEpisodeRepresentable {
        AnyEpisodeRepresentable {
            inner: Arc::new(self),
        }
    }
}

/// Object-safe vtable behind [`AnyEpisodeRepresentable`].
trait ErasedEpisode: fmt::Debug + Send + Sync {
    fn dyn_number(&self) -> u32;
    fn dyn_title(&self) -> &str;
    fn dyn_thumbnail(&self) -> Option<&ImageSize>;
    fn dyn_is_filler(&self) -> bool;
    fn dyn_links(&self) -> &BTreeSet<EpisodeLink>;
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedEpisode) -> bool;
    fn hash_erased(&self, state: &mut dyn Hasher);
}

impl<T: EpisodeRepresentable> ErasedEpisode for T {
    fn dyn_number(&self) -> u32 {
        EpisodeRepresentable::number(self)
    }

    fn dyn_title(&self) -> &str {
        EpisodeRepresentable::title(self)
    }

    fn dyn_thumbnail(&self) -> Option<&ImageSize> {
        EpisodeRepresentable::thumbnail(self)
    }

    fn dyn_is_filler(&self) -> bool {
        EpisodeRepresentable::is_filler(self)
    }

    fn dyn_links(&self) -> &BTreeSet<EpisodeLink> {
        EpisodeRepresentable::links(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedEpisode) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn hash_erased(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Type-erased episode. Cheap to clone.
#[derive(Clone)]
pub struct AnyEpisodeRepresentable {
    inner: Arc<dyn ErasedEpisode>,
}

impl AnyEpisodeRepresentable {
    /// Borrow the wrapped value as its concrete type, if it is one.
    pub fn downcast_ref<T: EpisodeRepresentable>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl EpisodeRepresentable for AnyEpisodeRepresentable {
    fn number(&self) -> u32 {
        self.inner.dyn_number()
    }

    fn title(&self) -> &str {
        self.inner.dyn_title()
    }

    fn thumbnail(&self) -> Option<&ImageSize> {
        self.inner.dyn_thumbnail()
    }

    fn is_filler(&self) -> bool {
        self.inner.dyn_is_filler()
    }

    fn links(&self) -> &BTreeSet<EpisodeLink> {
        self.inner.dyn_links()
    }

    fn erase(self) -> AnyEpisodeRepresentable {
        self
    }
}

impl PartialEq for AnyEpisodeRepresentable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.eq_erased(other.inner.as_ref())
    }
}

impl Eq for AnyEpisodeRepresentable {}

impl Hash for AnyEpisodeRepresentable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash_erased(state);
    }
}

impl fmt::Debug for AnyEpisodeRepresentable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

// ── Episode ──────────────────────────────────────────────────────

/// A fully described episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<ImageSize>,
    pub is_filler: bool,
    #[serde(default)]
    pub links: BTreeSet<EpisodeLink>,
}

impl EpisodeRepresentable for Episode {
    fn number(&self) -> u32 {
        self.number
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn thumbnail(&self) -> Option<&ImageSize> {
        self.thumbnail.as_ref()
    }

    fn is_filler(&self) -> bool {
        self.is_filler
    }

    fn links(&self) -> &BTreeSet<EpisodeLink> {
        &self.links
    }
}

const DEMO_THUMBNAIL: &str = "https://artworks.thetvdb.com/banners/episodes/79824/320623.jpg";
const DEMO_DESCRIPTION: &str =
    "An older and stronger Naruto returns from his two and a half years of training with Jiraiya.";

impl Episode {
    pub fn demo_episodes() -> Vec<Episode> {
        vec![
            Episode {
                number: 1,
                title: "Homecoming".into(),
                description: DEMO_DESCRIPTION.into(),
                thumbnail: ImageSize::original(DEMO_THUMBNAIL),
                is_filler: false,
                links: BTreeSet::new(),
            },
            Episode {
                number: 2,
                title: "Homecoming 2".into(),
                description: DEMO_DESCRIPTION.into(),
                thumbnail: ImageSize::original(DEMO_THUMBNAIL),
                is_filler: true,
                links: BTreeSet::new(),
            },
        ]
    }

    /// Stand-in shown while the real episode list is loading.
    pub fn placeholder(number: u32) -> Episode {
        Episode {
            number,
            title: "Placeholder".into(),
            description: "Placeholder".into(),
            thumbnail: None,
            is_filler: false,
            links: BTreeSet::new(),
        }
    }

    pub fn placeholders(count: u32) -> Vec<Episode> {
        (0..count).map(Self::placeholder).collect()
    }
}
