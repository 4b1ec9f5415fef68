/// Persistence ports for the movie catalog and the rating store
///
/// Both ports are consumed as `Arc<dyn …>` by the services so the engine can
/// run against Postgres in production and against the in-memory
/// implementations in tests. The ports deliberately carry no score
/// validation: both rating scales (user 1-10, curator 1-100) pass through the
/// same store, and callers validate before reaching this layer.
use crate::error::AppResult;
use crate::models::{Movie, MovieId, NewMovie, PagedMovies, Rater, Rating};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCatalog, MemoryRatingStore};
pub use postgres::{PgMovieCatalog, PgRatingStore};

/// Filters for the paged catalog listing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CatalogPage {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    /// Keep only movies whose denormalized average is at least this
    pub min_rating: Option<f64>,
    /// Keep only movies whose denormalized average is at most this
    pub max_rating: Option<f64>,
}

/// Persisted movie catalog
///
/// `insert` surfaces a unique-constraint violation on the external id as
/// `AppError::Conflict`; ingestion treats that as "someone else just created
/// it" and re-resolves instead of failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn find_by_id(&self, movie_id: MovieId) -> AppResult<Option<Movie>>;

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Movie>>;

    /// Exact match on (trimmed title, release year), for the CSV importer
    async fn find_by_title_year(&self, title: &str, year: i32) -> AppResult<Option<Movie>>;

    /// Case-insensitive substring match on title
    async fn search_title(&self, query: &str) -> AppResult<Vec<Movie>>;

    async fn insert(&self, movie: NewMovie) -> AppResult<MovieId>;

    /// Writes the denormalized aggregate columns (owned by the aggregation
    /// engine; always recomputable from rating rows)
    async fn update_aggregates(&self, movie_id: MovieId, average: f64, count: i32)
        -> AppResult<()>;

    async fn list(&self, page: CatalogPage) -> AppResult<PagedMovies>;
}

/// Per-(rater, movie) score persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    async fn get(&self, rater: Rater, movie_id: MovieId) -> AppResult<Option<Rating>>;

    /// All ratings authored through one channel; `Rater::User(id)` can never
    /// observe curator rows and vice versa
    async fn list_for_rater(&self, rater: Rater) -> AppResult<Vec<Rating>>;

    async fn list_for_movie(&self, movie_id: MovieId) -> AppResult<Vec<Rating>>;

    async fn list_all(&self) -> AppResult<Vec<Rating>>;

    /// Creates or overwrites the (rater, movie) row, refreshing its timestamp
    async fn upsert(&self, rater: Rater, movie_id: MovieId, score: i32) -> AppResult<Rating>;

    /// Returns false when the pair was absent
    async fn remove(&self, rater: Rater, movie_id: MovieId) -> AppResult<bool>;
}
