use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local surrogate key for a persisted movie
pub type MovieId = i64;

/// Identifier of an end user, owned by the out-of-scope auth service
pub type UserId = i64;

/// Who authored a rating.
///
/// The curator channel replaces the original "magic configured user id"
/// pattern: it can never collide with a real user id because it is a distinct
/// variant, not a reserved number in the same key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "channel", content = "user_id")]
pub enum Rater {
    /// An ordinary end user
    User(UserId),
    /// The single distinguished editorial rating channel
    Curator,
}

impl Rater {
    /// Storage encoding: channel discriminator column value
    pub fn channel(&self) -> &'static str {
        match self {
            Rater::User(_) => "user",
            Rater::Curator => "curator",
        }
    }

    /// Storage encoding: user id column value (curator rows are pinned to 0)
    pub fn user_key(&self) -> i64 {
        match self {
            Rater::User(id) => *id,
            Rater::Curator => 0,
        }
    }

    /// Decodes the storage encoding back into a channel
    pub fn decode(channel: &str, user_id: i64) -> Option<Rater> {
        match channel {
            "user" => Some(Rater::User(user_id)),
            "curator" => Some(Rater::Curator),
            _ => None,
        }
    }
}

/// A persisted catalog movie
///
/// `average_rating` and `rating_count` are denormalized views maintained by
/// the aggregation engine; the rating rows remain the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub movie_id: MovieId,
    /// External metadata provider id; unique among persisted movies, absent
    /// for local-only/historical entries
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
    pub average_rating: f64,
    pub rating_count: i32,
}

/// Fields needed to persist a new movie (the surrogate key is assigned by the
/// catalog on insert)
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
}

impl From<ExternalDetail> for NewMovie {
    fn from(detail: ExternalDetail) -> Self {
        let release_year = detail.release_year();
        NewMovie {
            external_id: Some(detail.external_id),
            title: detail.title,
            poster_url: detail.poster_path,
            overview: detail.overview,
            release_year,
        }
    }
}

impl From<ExternalSearchHit> for NewMovie {
    fn from(hit: ExternalSearchHit) -> Self {
        let release_year = hit.release_year();
        NewMovie {
            external_id: Some(hit.external_id),
            title: hit.title,
            poster_url: hit.poster_path,
            overview: None,
            release_year,
        }
    }
}

/// A single rating row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    #[serde(flatten)]
    pub rater: Rater,
    pub movie_id: MovieId,
    pub score: i32,
    pub rated_at: DateTime<Utc>,
}

// ============================================================================
// External metadata provider types (transient, never persisted as-is)
// ============================================================================

/// One search or trending result from the metadata provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalSearchHit {
    pub external_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    /// Provider-formatted date, e.g. "2010-07-16"; may be empty
    pub release_date: Option<String>,
}

impl ExternalSearchHit {
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.as_deref().and_then(parse_release_year)
    }
}

/// Full detail for one external movie, including cast credits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalDetail {
    pub external_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub cast: Vec<CastMember>,
}

impl ExternalDetail {
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.as_deref().and_then(parse_release_year)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CastMember {
    pub name: String,
    pub character: String,
}

/// Extracts the year from a provider date string ("YYYY-MM-DD" or bare "YYYY")
pub fn parse_release_year(date: &str) -> Option<i32> {
    let year = date.split('-').next()?.trim();
    if year.len() != 4 {
        return None;
    }
    year.parse().ok()
}

// ============================================================================
// View types returned to callers
// ============================================================================

/// Where a merged search entry came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrigin {
    /// Persisted in the local catalog; carries aggregates
    Local,
    /// Known only to the metadata provider; not yet ingested
    External,
}

/// One entry in the merged local+external search result list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchEntry {
    /// Absent for external hits that were never ingested
    pub movie_id: Option<MovieId>,
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_year: Option<i32>,
    pub average_rating: f64,
    pub rating_count: i32,
    pub origin: SearchOrigin,
}

impl From<&Movie> for SearchEntry {
    fn from(movie: &Movie) -> Self {
        SearchEntry {
            movie_id: Some(movie.movie_id),
            external_id: movie.external_id.clone(),
            title: movie.title.clone(),
            poster_url: movie.poster_url.clone(),
            release_year: movie.release_year,
            average_rating: movie.average_rating,
            rating_count: movie.rating_count,
            origin: SearchOrigin::Local,
        }
    }
}

impl From<ExternalSearchHit> for SearchEntry {
    fn from(hit: ExternalSearchHit) -> Self {
        let release_year = hit.release_year();
        SearchEntry {
            movie_id: None,
            external_id: Some(hit.external_id),
            title: hit.title,
            poster_url: hit.poster_path,
            release_year,
            average_rating: 0.0,
            rating_count: 0,
            origin: SearchOrigin::External,
        }
    }
}

/// Detail view for a local movie or a not-yet-ingested external one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub movie_id: Option<MovieId>,
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub overview: Option<String>,
    pub release_year: Option<i32>,
    pub cast: Vec<CastMember>,
    /// The viewer's own rating, when a viewer was supplied
    pub user_rating: Option<i32>,
    /// The curator rating, surfaced separately from the user average
    pub curator_rating: Option<i32>,
}

/// One row of the ranked trending view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingEntry {
    pub movie_id: MovieId,
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub average_rating: f64,
    pub rating_count: i32,
}

/// One curator rating joined with its movie, for the admin listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CuratorRatingEntry {
    pub movie_id: MovieId,
    pub external_id: Option<String>,
    pub title: String,
    pub poster_url: Option<String>,
    pub score: i32,
}

/// Paged catalog listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagedMovies {
    pub items: Vec<Movie>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
