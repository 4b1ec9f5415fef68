use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{Movie, MovieId, NewMovie, PagedMovies, Rater, Rating};
use crate::store::{CatalogPage, MovieCatalog, RatingStore};

/// In-memory movie catalog
///
/// Mirrors the Postgres implementation's observable behavior, including the
/// external-id uniqueness `Conflict`, so the engine and the integration tests
/// can run without a database.
#[derive(Default)]
pub struct MemoryCatalog {
    inner: RwLock<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    movies: HashMap<MovieId, Movie>,
    next_id: MovieId,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MovieCatalog for MemoryCatalog {
    async fn find_by_id(&self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&movie_id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Movie>> {
        let inner = self.inner.read().await;
        Ok(inner
            .movies
            .values()
            .find(|m| m.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_title_year(&self, title: &str, year: i32) -> AppResult<Option<Movie>> {
        let inner = self.inner.read().await;
        Ok(inner
            .movies
            .values()
            .find(|m| m.title == title && m.release_year == Some(year))
            .cloned())
    }

    async fn search_title(&self, query: &str) -> AppResult<Vec<Movie>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut matches: Vec<Movie> = inner
            .movies
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(matches)
    }

    async fn insert(&self, movie: NewMovie) -> AppResult<MovieId> {
        let mut inner = self.inner.write().await;

        if let Some(external_id) = &movie.external_id {
            let taken = inner
                .movies
                .values()
                .any(|m| m.external_id.as_deref() == Some(external_id.as_str()));
            if taken {
                return Err(AppError::Conflict(format!(
                    "Movie with external id {:?} already exists",
                    external_id
                )));
            }
        }

        inner.next_id += 1;
        let movie_id = inner.next_id;
        inner.movies.insert(
            movie_id,
            Movie {
                movie_id,
                external_id: movie.external_id,
                title: movie.title,
                poster_url: movie.poster_url,
                overview: movie.overview,
                release_year: movie.release_year,
                average_rating: 0.0,
                rating_count: 0,
            },
        );

        Ok(movie_id)
    }

    async fn update_aggregates(
        &self,
        movie_id: MovieId,
        average: f64,
        count: i32,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(movie) = inner.movies.get_mut(&movie_id) {
            movie.average_rating = average;
            movie.rating_count = count;
        }
        Ok(())
    }

    async fn list(&self, page: CatalogPage) -> AppResult<PagedMovies> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Movie> = inner
            .movies
            .values()
            .filter(|m| {
                page.min_rating.map_or(true, |min| m.average_rating >= min)
                    && page.max_rating.map_or(true, |max| m.average_rating <= max)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title));

        let total = matches.len() as i64;
        let offset = page.page.saturating_sub(1) as usize * page.page_size as usize;
        let items = matches
            .into_iter()
            .skip(offset)
            .take(page.page_size as usize)
            .collect();

        Ok(PagedMovies {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

/// In-memory rating store keyed by (rater, movie)
#[derive(Default)]
pub struct MemoryRatingStore {
    inner: RwLock<HashMap<(Rater, MovieId), Rating>>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RatingStore for MemoryRatingStore {
    async fn get(&self, rater: Rater, movie_id: MovieId) -> AppResult<Option<Rating>> {
        Ok(self.inner.read().await.get(&(rater, movie_id)).cloned())
    }

    async fn list_for_rater(&self, rater: Rater) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        let mut ratings: Vec<Rating> = inner
            .values()
            .filter(|r| r.rater == rater)
            .cloned()
            .collect();
        ratings.sort_by_key(|r| r.movie_id);
        Ok(ratings)
    }

    async fn list_for_movie(&self, movie_id: MovieId) -> AppResult<Vec<Rating>> {
        let inner = self.inner.read().await;
        Ok(inner
            .values()
            .filter(|r| r.movie_id == movie_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Rating>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn upsert(&self, rater: Rater, movie_id: MovieId, score: i32) -> AppResult<Rating> {
        let rating = Rating {
            rater,
            movie_id,
            score,
            rated_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .insert((rater, movie_id), rating.clone());
        Ok(rating)
    }

    async fn remove(&self, rater: Rater, movie_id: MovieId) -> AppResult<bool> {
        Ok(self.inner.write().await.remove(&(rater, movie_id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, external_id: Option<&str>) -> NewMovie {
        NewMovie {
            external_id: external_id.map(str::to_string),
            title: title.to_string(),
            poster_url: None,
            overview: None,
            release_year: Some(2010),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let catalog = MemoryCatalog::new();
        let a = catalog.insert(movie("Inception", Some("27205"))).await.unwrap();
        let b = catalog.insert(movie("Heat", Some("949"))).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_insert_duplicate_external_id_conflicts() {
        let catalog = MemoryCatalog::new();
        catalog.insert(movie("Inception", Some("27205"))).await.unwrap();

        let err = catalog
            .insert(movie("Inception again", Some("27205")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_insert_allows_many_movies_without_external_id() {
        let catalog = MemoryCatalog::new();
        catalog.insert(movie("Home Video A", None)).await.unwrap();
        catalog.insert(movie("Home Video B", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_title_is_case_insensitive_substring() {
        let catalog = MemoryCatalog::new();
        catalog.insert(movie("The Dark Knight", Some("155"))).await.unwrap();
        catalog.insert(movie("Dark City", Some("2666"))).await.unwrap();
        catalog.insert(movie("Heat", Some("949"))).await.unwrap();

        let hits = catalog.search_title("dark").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_in_place() {
        let store = MemoryRatingStore::new();
        store.upsert(Rater::User(1), 10, 80).await.unwrap();
        store.upsert(Rater::User(1), 10, 95).await.unwrap();

        let rating = store.get(Rater::User(1), 10).await.unwrap().unwrap();
        assert_eq!(rating.score, 95);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_pair_returns_false() {
        let store = MemoryRatingStore::new();
        assert!(!store.remove(Rater::User(1), 10).await.unwrap());

        store.upsert(Rater::User(1), 10, 80).await.unwrap();
        assert!(store.remove(Rater::User(1), 10).await.unwrap());
        assert!(!store.remove(Rater::User(1), 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_curator_rows_invisible_to_user_listing() {
        let store = MemoryRatingStore::new();
        store.upsert(Rater::Curator, 10, 99).await.unwrap();
        store.upsert(Rater::User(0), 10, 5).await.unwrap();

        let curator = store.list_for_rater(Rater::Curator).await.unwrap();
        assert_eq!(curator.len(), 1);
        assert_eq!(curator[0].score, 99);

        // user id 0 is a real (if odd) user channel key, not the curator
        let user_zero = store.list_for_rater(Rater::User(0)).await.unwrap();
        assert_eq!(user_zero.len(), 1);
        assert_eq!(user_zero[0].score, 5);
    }
}
