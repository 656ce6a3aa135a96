mod anime;
mod episode;
mod image;

pub use anime::{Anime, AnimeFormat, AnimeStatus, UpdatedAnimeEpisode};
pub use episode::{AnyEpisodeRepresentable, Audio, Episode, EpisodeLink, EpisodeRepresentable};
pub use image::{ImageSize, ImageSizes};
