use serde::{Deserialize, Serialize};

use super::episode::Episode;
use super::image::ImageSize;

/// Airing status of an anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimeStatus {
    Finished,
    Current,
    Upcoming,
    Unreleased,
    Tba,
}

impl AnimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "Finished",
            Self::Current => "Airing",
            Self::Upcoming => "Upcoming",
            Self::Unreleased => "Unreleased",
            Self::Tba => "TBA",
        }
    }
}

impl std::fmt::Display for AnimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release format of an anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimeFormat {
    Movie,
    Tv,
    TvShort,
    Ova,
    Ona,
    Special,
}

impl AnimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Tv => "TV",
            Self::TvShort => "TV Short",
            Self::Ova => "OVA",
            Self::Ona => "ONA",
            Self::Special => "Special",
        }
    }
}

impl std::fmt::Display for AnimeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core anime entity as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anime {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub poster_image: Vec<ImageSize>,
    pub cover_image: Vec<ImageSize>,
    pub categories: Vec<String>,
    pub status: AnimeStatus,
    pub format: AnimeFormat,
}

impl Anime {
    pub fn naruto_shippuden() -> Self {
        Self {
            id: 1735,
            title: "Naruto: Shippuuden".into(),
            description: "It has been two and a half years since Naruto Uzumaki left Konohagakure, \
                          the Hidden Leaf Village, for intense training following events which \
                          fueled his desire to be stronger."
                .into(),
            poster_image: ImageSize::original(
                "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx1735-80JNPAlZmWUs.png",
            )
            .into_iter()
            .collect(),
            cover_image: ImageSize::original(
                "https://s4.anilist.co/file/anilistcdn/media/anime/banner/1735.jpg",
            )
            .into_iter()
            .collect(),
            categories: vec!["Action".into(), "Adventure".into(), "Comedy".into()],
            status: AnimeStatus::Finished,
            format: AnimeFormat::Tv,
        }
    }
}

/// A freshly aired episode together with the anime it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedAnimeEpisode {
    pub anime: Anime,
    pub episode: Episode,
}
