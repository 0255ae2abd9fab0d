use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::util::year_only;

/// Reads a missing or `null` value as `T::default()`.
///
/// The catalog API sends `null` for empty lists and flags on some records;
/// one such record must not fail the whole page.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Kind of record returned by the catalog API.
///
/// Only mixed endpoints (`/search/multi`, `/trending/all`) tag their results;
/// genre endpoints leave `media_type` out entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Person,
    #[serde(other)]
    Unknown,
}

impl MediaType {
    /// Path segment of the detail endpoint for this kind, if it has one.
    pub fn detail_segment(self) -> Option<&'static str> {
        match self {
            MediaType::Movie => Some("movie"),
            MediaType::Tv => Some("tv"),
            MediaType::Person | MediaType::Unknown => None,
        }
    }
}

/// A movie or show as returned by the catalog API, plus the local
/// `isFavourite` flag.
///
/// Items are plain values: every slice, search result and favourites entry
/// holds its own copy. Fields the crate does not read are kept in `extra`
/// and written back out unchanged, so a stored snapshot is the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub adult: bool,
    #[serde(default, rename = "isFavourite", deserialize_with = "null_as_default")]
    pub is_favourite: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Minimal item with only an id and a title, as used by fixtures.
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            media_type: None,
            title: Some(title.into()),
            name: None,
            original_title: None,
            original_name: None,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            genre_ids: Vec::new(),
            release_date: None,
            first_air_date: None,
            vote_average: None,
            original_language: None,
            adult: false,
            is_favourite: false,
            extra: Map::new(),
        }
    }

    /// Display title: movies carry `title`, shows carry `name`; the original
    /// titles are last resorts.
    pub fn fallback_title(&self) -> &str {
        [
            &self.title,
            &self.name,
            &self.original_title,
            &self.original_name,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|t| !t.trim().is_empty())
        .unwrap_or("")
    }

    /// Release year, from the movie release date or the first air date.
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(year_only)
            .or_else(|| self.first_air_date.as_deref().and_then(year_only))
    }

    /// Genre names for the item's genre ids; unknown ids are skipped.
    pub fn genre_names(&self) -> Vec<&'static str> {
        self.genre_ids.iter().filter_map(|&id| genre_name(id)).collect()
    }

    /// Full poster URL, falling back to the backdrop and then to `fallback`.
    pub fn poster_url(&self, image_base_url: &str, fallback: &str) -> String {
        self.poster_path
            .as_deref()
            .or(self.backdrop_path.as_deref())
            .map(|p| format!("{}/{}", image_base_url.trim_end_matches('/'), p.trim_start_matches('/')))
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn is_person(&self) -> bool {
        self.media_type == Some(MediaType::Person)
    }
}

/// Response envelope shared by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct ResultsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<Item>,
}

/// Genre ids used by the catalog API for movies and series.
const GENRES: &[(u32, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
    (10759, "Action & Adventure"),
    (10762, "Kids"),
    (10763, "News"),
    (10764, "Reality"),
    (10765, "Sci-Fi & Fantasy"),
    (10766, "Soap"),
    (10767, "Talk"),
    (10768, "War & Politics"),
];

pub fn genre_name(id: u32) -> Option<&'static str> {
    GENRES.iter().find(|(gid, _)| *gid == id).map(|(_, name)| *name)
}
