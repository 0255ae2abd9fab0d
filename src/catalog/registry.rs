//! Static table of content categories.
//!
//! Each browsing context (movies, series, popular) owns an ordered list of
//! [`CategoryDescriptor`]s. Order is display order for the home rows. The
//! popular context borrows some slices from the movies and series contexts:
//! when two descriptors query the same endpoint they point at the same slice.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::query::{
    discover_movies, discover_series, DynamicParam, Locale, QueryTemplate, SORT_POPULAR,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The context has no category with this genre key.
    #[error("No category '{genre}' in {context}")]
    NotFound { context: CategoryContext, genre: String },
    /// The context name itself is not recognised.
    #[error("Unknown browsing context '{0}'")]
    UnknownContext(String),
    /// Pages are numbered from 1.
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
}

/// A browsing context: the set of categories one page of the UI shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryContext {
    Movies,
    Series,
    Popular,
}

impl CategoryContext {
    pub const ALL: [CategoryContext; 3] = [
        CategoryContext::Movies,
        CategoryContext::Series,
        CategoryContext::Popular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryContext::Movies => "movies",
            CategoryContext::Series => "tvseries",
            CategoryContext::Popular => "popular",
        }
    }
}

impl fmt::Display for CategoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryContext {
    type Err = RegistryError;

    /// Accepts the route segments used by the browsing UI. `browse` is the
    /// landing page and shows the movie categories.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browse" | "movies" => Ok(CategoryContext::Movies),
            "tvseries" | "series" => Ok(CategoryContext::Series),
            "popular" => Ok(CategoryContext::Popular),
            other => Err(RegistryError::UnknownContext(other.to_string())),
        }
    }
}

/// Identifies one category state slice in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceKey(&'static str);

impl SliceKey {
    pub const fn new(key: &'static str) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Static metadata for one content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDescriptor {
    pub id: u32,
    pub title: &'static str,
    pub genre_key: &'static str,
    pub query: QueryTemplate,
    pub selector: SliceKey,
    /// Rendered as the large-poster carousel instead of a regular row.
    pub is_large: bool,
}

const fn category(
    id: u32,
    title: &'static str,
    genre_key: &'static str,
    query: QueryTemplate,
    selector: &'static str,
) -> CategoryDescriptor {
    CategoryDescriptor {
        id,
        title,
        genre_key,
        query,
        selector: SliceKey::new(selector),
        is_large: false,
    }
}

const fn large(mut descriptor: CategoryDescriptor) -> CategoryDescriptor {
    descriptor.is_large = true;
    descriptor
}

const TRENDING_MOVIES: QueryTemplate = QueryTemplate::new("/trending/movie/week", SORT_POPULAR);
const TRENDING_SERIES: QueryTemplate = QueryTemplate::new("/trending/tv/week", SORT_POPULAR);
const TRENDING_ALL: QueryTemplate = QueryTemplate::new("/trending/all/week", SORT_POPULAR);
const UPCOMING_MOVIES: QueryTemplate = QueryTemplate::new("/movie/upcoming", &[]);
const TOP_RATED_MOVIES: QueryTemplate =
    QueryTemplate::new("/movie/top_rated", SORT_POPULAR).with_locale(Locale::Region);
const LATEST_MOVIES: QueryTemplate =
    discover_movies(SORT_POPULAR).with_dynamic(DynamicParam::ReleasedWithinLastMonth);

static MOVIES: [CategoryDescriptor; 10] = [
    large(category(0, "Trending Now", "trending", TRENDING_MOVIES, "movies.trending")),
    category(1, "Upcoming", "upcoming", UPCOMING_MOVIES, "movies.upcoming"),
    category(2, "Top Rated", "toprated", TOP_RATED_MOVIES, "movies.top_rated"),
    category(
        3,
        "Action",
        "action",
        discover_movies(&[("with_genres", "28"), ("sort_by", "popularity.desc")]),
        "movies.action",
    ),
    category(
        4,
        "Adventure",
        "adventure",
        discover_movies(&[("with_genres", "12"), ("sort_by", "popularity.desc")]),
        "movies.adventure",
    ),
    category(
        5,
        "Comedy",
        "comedy",
        discover_movies(&[("with_genres", "35"), ("sort_by", "popularity.desc")]),
        "movies.comedy",
    ),
    category(
        6,
        "Horror",
        "horror",
        discover_movies(&[("with_genres", "27"), ("sort_by", "popularity.desc")]),
        "movies.horror",
    ),
    category(
        7,
        "Romance",
        "romance",
        discover_movies(&[("with_genres", "10749"), ("sort_by", "popularity.desc")]),
        "movies.romance",
    ),
    category(
        8,
        "War",
        "war",
        discover_movies(&[("with_genres", "10752"), ("sort_by", "popularity.desc")]),
        "movies.war",
    ),
    category(
        9,
        "Animation",
        "animation",
        discover_movies(&[("with_genres", "16"), ("sort_by", "popularity.desc")]),
        "movies.animation",
    ),
];

static SERIES: [CategoryDescriptor; 10] = [
    large(category(0, "Trending Now", "trending", TRENDING_SERIES, "series.trending")),
    category(
        1,
        "Netflix Originals",
        "netflix",
        discover_series(&[("with_networks", "213"), ("sort_by", "popularity.desc")]),
        "series.netflix",
    ),
    category(
        2,
        "Action & Adventure",
        "actionadventure",
        discover_series(&[("with_genres", "10759"), ("sort_by", "popularity.desc")]),
        "series.action_adventure",
    ),
    category(
        3,
        "Animation",
        "animation",
        discover_series(&[("with_genres", "16"), ("sort_by", "popularity.desc")]),
        "series.animation",
    ),
    category(
        4,
        "Comedy",
        "comedy",
        discover_series(&[("with_genres", "35"), ("sort_by", "popularity.desc")]),
        "series.comedy",
    ),
    category(
        5,
        "Crime",
        "crime",
        discover_series(&[("with_genres", "80"), ("sort_by", "popularity.desc")]),
        "series.crime",
    ),
    category(
        6,
        "Documentary",
        "documentary",
        discover_series(&[("with_genres", "99"), ("sort_by", "popularity.desc")]),
        "series.documentary",
    ),
    category(
        7,
        "Family",
        "family",
        discover_series(&[("with_genres", "10751"), ("sort_by", "popularity.desc")]),
        "series.family",
    ),
    category(
        8,
        "Kids",
        "kids",
        discover_series(&[("with_genres", "10762"), ("sort_by", "popularity.desc")]),
        "series.kids",
    ),
    category(
        9,
        "Sci-Fi & Fantasy",
        "scifi",
        discover_series(&[("with_genres", "10765"), ("sort_by", "popularity.desc")]),
        "series.scifi_fantasy",
    ),
];

static POPULAR: [CategoryDescriptor; 6] = [
    large(category(0, "Trending Now", "trending", TRENDING_ALL, "popular.trending")),
    category(1, "Latest Releases", "latest", LATEST_MOVIES, "popular.latest"),
    category(2, "Upcoming Movies", "upcoming", UPCOMING_MOVIES, "movies.upcoming"),
    category(3, "Top Rated Movies", "toprated", TOP_RATED_MOVIES, "movies.top_rated"),
    category(4, "Trending Movies", "trendingmovies", TRENDING_MOVIES, "movies.trending"),
    category(5, "Trending Series", "trendingseries", TRENDING_SERIES, "series.trending"),
];

/// All descriptors for a context, in display order.
pub fn descriptors(context: CategoryContext) -> &'static [CategoryDescriptor] {
    match context {
        CategoryContext::Movies => &MOVIES,
        CategoryContext::Series => &SERIES,
        CategoryContext::Popular => &POPULAR,
    }
}

/// Finds the descriptor for `genre_key` within `context`.
///
/// Genre keys are matched exactly; an unknown key is `NotFound` and callers
/// render nothing for it.
pub fn resolve(
    context: CategoryContext,
    genre_key: &str,
) -> Result<&'static CategoryDescriptor, RegistryError> {
    descriptors(context)
        .iter()
        .find(|d| d.genre_key == genre_key)
        .ok_or_else(|| RegistryError::NotFound {
            context,
            genre: genre_key.to_string(),
        })
}

/// [`resolve`] with the context given by name (`browse`, `movies`, `tvseries`, `popular`).
pub fn resolve_named(
    context: &str,
    genre_key: &str,
) -> Result<&'static CategoryDescriptor, RegistryError> {
    resolve(context.parse()?, genre_key)
}

/// Every distinct slice key referenced by any context, sorted.
pub fn slice_keys() -> Vec<SliceKey> {
    let mut keys: Vec<SliceKey> = CategoryContext::ALL
        .iter()
        .flat_map(|&ctx| descriptors(ctx).iter().map(|d| d.selector))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}
