use serde::{Deserialize, Serialize};
use url::Url;

/// An image reference tagged with its size class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "size", content = "url", rename_all = "lowercase")]
pub enum ImageSize {
    Tiny(Url),
    Small(Url),
    Medium(Url),
    Large(Url),
    Original(Url),
}

impl ImageSize {
    pub fn url(&self) -> &Url {
        match self {
            Self::Tiny(url)
            | Self::Small(url)
            | Self::Medium(url)
            | Self::Large(url)
            | Self::Original(url) => url,
        }
    }

    /// Parse a URL string into an `Original` image. Unparsable input yields `None`.
    pub fn original(raw: &str) -> Option<Self> {
        Url::parse(raw).ok().map(Self::Original)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Tiny(_) => 0,
            Self::Small(_) => 1,
            Self::Medium(_) => 2,
            Self::Large(_) => 3,
            Self::Original(_) => 4,
        }
    }
}

/// Size-aware accessors over a collection of images.
pub trait ImageSizes {
    /// The image with the highest size class; the first one wins on ties.
    fn largest(&self) -> Option<&ImageSize>;
}

impl ImageSizes for [ImageSize] {
    fn largest(&self) -> Option<&ImageSize> {
        self.iter().fold(None, |best, image| match best {
            Some(current) if current.rank() >= image.rank() => Some(current),
            _ => Some(image),
        })
    }
}
