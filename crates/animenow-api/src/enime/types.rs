use std::collections::BTreeSet;

use serde::Deserialize;

use animenow_core::models::{
    Anime, AnimeFormat, AnimeStatus, Episode, ImageSize, ImageSizes, UpdatedAnimeEpisode,
};

// ── Response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecentResponse {
    pub data: Vec<RecentItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
    /// Enime episode id.
    pub id: String,
    pub number: u32,
    pub image: Option<String>,
    pub updated_at: Option<String>,
    pub aired_at: Option<String>,
    pub anime: EnimeAnime,
    pub title_variations: Option<EnimeTitle>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnimeAnime {
    pub id: String,
    pub anilist_id: u64,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub title: Option<EnimeTitle>,
    pub status: String,
    pub format: String,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct EnimeTitle {
    pub native: Option<String>,
    pub romaji: Option<String>,
    pub english: Option<String>,
}

// ── Code mapping ─────────────────────────────────────────────────

/// Map an AniList format code. Unknown codes degrade to TV.
pub fn map_format(code: &str) -> AnimeFormat {
    match code {
        "MOVIE" => AnimeFormat::Movie,
        "TV" => AnimeFormat::Tv,
        "TV_SHORT" => AnimeFormat::TvShort,
        "OVA" => AnimeFormat::Ova,
        "ONA" => AnimeFormat::Ona,
        "SPECIAL" => AnimeFormat::Special,
        _ => AnimeFormat::Tv,
    }
}

/// Map an AniList status code. Unknown codes degrade to currently airing.
pub fn map_status(code: &str) -> AnimeStatus {
    match code {
        "FINISHED" => AnimeStatus::Finished,
        "RELEASING" => AnimeStatus::Current,
        "NOT_YET_RELEASED" => AnimeStatus::Upcoming,
        "CANCELLED" => AnimeStatus::Unreleased,
        "HIATUS" => AnimeStatus::Tba,
        _ => AnimeStatus::Current,
    }
}

// ── Conversions ──────────────────────────────────────────────────

impl EnimeAnime {
    pub fn into_anime(self) -> Anime {
        let title = self
            .title
            .and_then(|t| t.english.or(t.romaji).or(t.native))
            .unwrap_or_else(|| "Unknown".into());

        Anime {
            id: self.anilist_id,
            title,
            description: self
                .description
                .unwrap_or_else(|| "Description unavailable".into()),
            poster_image: self
                .cover_image
                .as_deref()
                .and_then(ImageSize::original)
                .into_iter()
                .collect(),
            cover_image: self
                .banner_image
                .as_deref()
                .and_then(ImageSize::original)
                .into_iter()
                .collect(),
            categories: self.genre.unwrap_or_default(),
            status: map_status(&self.status),
            format: map_format(&self.format),
        }
    }
}

impl RecentItem {
    pub fn into_updated_episode(self) -> UpdatedAnimeEpisode {
        let number = self.number;
        let anime = self.anime.into_anime();

        let title = self
            .title_variations
            .and_then(|t| t.english.or(t.romaji))
            .unwrap_or_else(|| format!("Episode {number}"));

        let thumbnail = self
            .image
            .as_deref()
            .and_then(ImageSize::original)
            .or_else(|| anime.poster_image.largest().cloned());

        let episode = Episode {
            number,
            title,
            description: self
                .description
                .unwrap_or_else(|| "No description available.".into()),
            thumbnail,
            // Enime carries no filler flag.
            is_filler: false,
            links: BTreeSet::new(),
        };

        UpdatedAnimeEpisode { anime, episode }
    }
}
