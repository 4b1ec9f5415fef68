use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{Movie, MovieId, NewMovie, PagedMovies, Rater, Rating};
use crate::store::{CatalogPage, MovieCatalog, RatingStore};

const MOVIE_COLUMNS: &str = "movie_id, external_id, title, poster_url, overview, release_year, \
                             average_rating, rating_count";
const RATING_COLUMNS: &str = "channel, user_id, movie_id, score, rated_at";

#[derive(sqlx::FromRow)]
struct MovieRow {
    movie_id: i64,
    external_id: Option<String>,
    title: String,
    poster_url: Option<String>,
    overview: Option<String>,
    release_year: Option<i32>,
    average_rating: f64,
    rating_count: i32,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            movie_id: row.movie_id,
            external_id: row.external_id,
            title: row.title,
            poster_url: row.poster_url,
            overview: row.overview,
            release_year: row.release_year,
            average_rating: row.average_rating,
            rating_count: row.rating_count,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    channel: String,
    user_id: i64,
    movie_id: i64,
    score: i32,
    rated_at: DateTime<Utc>,
}

impl RatingRow {
    fn into_rating(self) -> AppResult<Rating> {
        let rater = Rater::decode(&self.channel, self.user_id).ok_or_else(|| {
            AppError::Internal(format!("Unknown rating channel in store: {}", self.channel))
        })?;

        Ok(Rating {
            rater,
            movie_id: self.movie_id,
            score: self.score,
            rated_at: self.rated_at,
        })
    }
}

/// Movie catalog backed by Postgres
///
/// The partial unique index on `external_id` is what arbitrates concurrent
/// ingestion of the same unseen external movie.
#[derive(Clone)]
pub struct PgMovieCatalog {
    pool: PgPool,
}

impl PgMovieCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MovieCatalog for PgMovieCatalog {
    async fn find_by_id(&self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE movie_id = $1"
        ))
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Movie::from))
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Movie::from))
    }

    async fn find_by_title_year(&self, title: &str, year: i32) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE title = $1 AND release_year = $2 LIMIT 1"
        ))
        .bind(title)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Movie::from))
    }

    async fn search_title(&self, query: &str) -> AppResult<Vec<Movie>> {
        // Substring semantics: % and _ in the query widen the match, same as
        // the ILIKE search this replaces
        let pattern = format!("%{}%", query);
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE title ILIKE $1 ORDER BY title"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn insert(&self, movie: NewMovie) -> AppResult<MovieId> {
        let result = sqlx::query_scalar::<_, i64>(
            "INSERT INTO movies (external_id, title, poster_url, overview, release_year, \
             average_rating, rating_count) \
             VALUES ($1, $2, $3, $4, $5, 0, 0) RETURNING movie_id",
        )
        .bind(&movie.external_id)
        .bind(&movie.title)
        .bind(&movie.poster_url)
        .bind(&movie.overview)
        .bind(movie.release_year)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(movie_id) => Ok(movie_id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict(format!(
                    "Movie with external id {:?} already exists",
                    movie.external_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_aggregates(
        &self,
        movie_id: MovieId,
        average: f64,
        count: i32,
    ) -> AppResult<()> {
        sqlx::query("UPDATE movies SET average_rating = $2, rating_count = $3 WHERE movie_id = $1")
            .bind(movie_id)
            .bind(average)
            .bind(count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self, page: CatalogPage) -> AppResult<PagedMovies> {
        let filter = "($1::double precision IS NULL OR average_rating >= $1) \
                      AND ($2::double precision IS NULL OR average_rating <= $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM movies WHERE {filter}"
        ))
        .bind(page.min_rating)
        .bind(page.max_rating)
        .fetch_one(&self.pool)
        .await?;

        let offset = i64::from(page.page.saturating_sub(1)) * i64::from(page.page_size);
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE {filter} \
             ORDER BY title LIMIT $3 OFFSET $4"
        ))
        .bind(page.min_rating)
        .bind(page.max_rating)
        .bind(i64::from(page.page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(PagedMovies {
            items: rows.into_iter().map(Movie::from).collect(),
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

/// Rating store backed by Postgres
///
/// `upsert` is a single `INSERT … ON CONFLICT DO UPDATE` statement, so
/// concurrent re-rates of the same (rater, movie) pair serialize on the
/// composite key without any application-side locking.
#[derive(Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RatingStore for PgRatingStore {
    async fn get(&self, rater: Rater, movie_id: MovieId) -> AppResult<Option<Rating>> {
        let row = sqlx::query_as::<_, RatingRow>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings \
             WHERE channel = $1 AND user_id = $2 AND movie_id = $3"
        ))
        .bind(rater.channel())
        .bind(rater.user_key())
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RatingRow::into_rating).transpose()
    }

    async fn list_for_rater(&self, rater: Rater) -> AppResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings \
             WHERE channel = $1 AND user_id = $2 ORDER BY rated_at DESC"
        ))
        .bind(rater.channel())
        .bind(rater.user_key())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RatingRow::into_rating).collect()
    }

    async fn list_for_movie(&self, movie_id: MovieId) -> AppResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE movie_id = $1"
        ))
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RatingRow::into_rating).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<Rating>> {
        let rows =
            sqlx::query_as::<_, RatingRow>(&format!("SELECT {RATING_COLUMNS} FROM ratings"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(RatingRow::into_rating).collect()
    }

    async fn upsert(&self, rater: Rater, movie_id: MovieId, score: i32) -> AppResult<Rating> {
        let row = sqlx::query_as::<_, RatingRow>(&format!(
            "INSERT INTO ratings (channel, user_id, movie_id, score, rated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (movie_id, channel, user_id) \
             DO UPDATE SET score = EXCLUDED.score, rated_at = now() \
             RETURNING {RATING_COLUMNS}"
        ))
        .bind(rater.channel())
        .bind(rater.user_key())
        .bind(movie_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;

        row.into_rating()
    }

    async fn remove(&self, rater: Rater, movie_id: MovieId) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM ratings WHERE channel = $1 AND user_id = $2 AND movie_id = $3",
        )
        .bind(rater.channel())
        .bind(rater.user_key())
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
