/// TMDB metadata provider
///
/// Wraps the TMDB v3 API with api-key authentication:
/// 1. Search: /search/movie?query=…
/// 2. Detail: /movie/{id}?append_to_response=credits (cast comes back in the
///    same response, no second round trip)
/// 3. Trending: /trending/movie/week
///
/// Responses are cached in Redis; the HTTP client carries a hard timeout so a
/// stalled provider can never hold up a request indefinitely (and metadata is
/// always fetched before any store write begins).
use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{CastMember, ExternalDetail, ExternalSearchHit},
    services::providers::MetadataProvider,
};

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAIL_CACHE_TTL: u64 = 86400; // 1 day
const TRENDING_CACHE_TTL: u64 = 3600; // 1 hour

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
        })
    }

    /// Fetches a hit list from one of the list-shaped TMDB endpoints
    async fn fetch_hit_list(&self, url: String, query: &[(&str, &str)]) -> AppResult<Vec<ExternalSearchHit>> {
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        let list: TmdbListResponse = response.json().await?;
        Ok(list.results.into_iter().map(ExternalSearchHit::from).collect())
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<ExternalSearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache,
            CacheKey::Search(query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let url = format!("{}/search/movie", self.api_url);
                let hits = self.fetch_hit_list(url, &[("query", query)]).await?;

                tracing::info!(
                    query = %query,
                    results = hits.len(),
                    provider = "tmdb",
                    "Movie search completed"
                );

                Ok::<_, AppError>(hits)
            }
        )
    }

    async fn get_by_id(&self, external_id: &str) -> AppResult<ExternalDetail> {
        cached!(
            self.cache,
            CacheKey::Detail(external_id.to_string()),
            DETAIL_CACHE_TTL,
            async move {
                let url = format!("{}/movie/{}", self.api_url, external_id);

                let response = self
                    .http_client
                    .get(&url)
                    .query(&[
                        ("api_key", self.api_key.as_str()),
                        ("append_to_response", "credits"),
                    ])
                    .send()
                    .await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(AppError::NotFound(format!(
                        "TMDB has no movie with id {}",
                        external_id
                    )));
                }

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Upstream(format!(
                        "TMDB API returned status {}: {}",
                        status, body
                    )));
                }

                let details: TmdbDetailsResponse = response.json().await?;

                tracing::info!(
                    external_id = %external_id,
                    cast = details.credits.cast.len(),
                    provider = "tmdb",
                    "Movie detail fetched"
                );

                Ok(ExternalDetail::from(details))
            }
        )
    }

    async fn trending(&self) -> AppResult<Vec<ExternalSearchHit>> {
        cached!(
            self.cache,
            CacheKey::Trending,
            TRENDING_CACHE_TTL,
            async move {
                let url = format!("{}/trending/movie/week", self.api_url);
                let hits = self.fetch_hit_list(url, &[]).await?;

                tracing::info!(results = hits.len(), provider = "tmdb", "Trending feed fetched");

                Ok::<_, AppError>(hits)
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

// Wire types matching TMDB JSON

#[derive(Debug, Deserialize)]
struct TmdbListResponse {
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
}

impl From<TmdbMovie> for ExternalSearchHit {
    fn from(movie: TmdbMovie) -> Self {
        ExternalSearchHit {
            // TMDB ids are numeric, but the stable join key is a string
            external_id: movie.id.to_string(),
            title: movie.title,
            poster_path: movie.poster_path,
            release_date: movie.release_date.filter(|d| !d.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbDetailsResponse {
    id: i64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    credits: TmdbCredits,
}

#[derive(Debug, Deserialize, Default)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCast>,
}

#[derive(Debug, Deserialize)]
struct TmdbCast {
    name: String,
    #[serde(default)]
    character: String,
}

impl From<TmdbDetailsResponse> for ExternalDetail {
    fn from(details: TmdbDetailsResponse) -> Self {
        ExternalDetail {
            external_id: details.id.to_string(),
            title: details.title,
            poster_path: details.poster_path,
            overview: details.overview.filter(|o| !o.is_empty()),
            release_date: details.release_date.filter(|d| !d.is_empty()),
            cast: details
                .credits
                .cast
                .into_iter()
                .map(|c| CastMember {
                    name: c.name,
                    character: c.character,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_provider() -> TmdbProvider {
        // The redis client connects lazily, so a dummy URL is fine for tests
        // that never touch the cache
        let cache = Cache::new(redis::Client::open("redis://localhost:6379").unwrap());
        TmdbProvider::new(
            cache,
            "test_key".to_string(),
            "http://test.local".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let provider = create_test_provider();
        let result = provider.search("   ").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_tmdb_movie_deserialization() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "release_date": "2010-07-16",
            "poster_path": "/inception.jpg"
        }"#;

        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        let hit = ExternalSearchHit::from(movie);
        assert_eq!(hit.external_id, "27205");
        assert_eq!(hit.title, "Inception");
        assert_eq!(hit.release_year(), Some(2010));
    }

    #[test]
    fn test_tmdb_movie_empty_release_date_becomes_none() {
        let json = r#"{"id": 1, "title": "Unreleased", "release_date": ""}"#;
        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        let hit = ExternalSearchHit::from(movie);
        assert_eq!(hit.release_date, None);
        assert_eq!(hit.release_year(), None);
    }

    #[test]
    fn test_tmdb_details_deserialization_with_credits() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "release_date": "2010-07-16",
            "overview": "A thief who steals corporate secrets",
            "poster_path": "/inception.jpg",
            "credits": {
                "cast": [
                    {"name": "Leonardo DiCaprio", "character": "Cobb"},
                    {"name": "Joseph Gordon-Levitt", "character": "Arthur"}
                ]
            }
        }"#;

        let details: TmdbDetailsResponse = serde_json::from_str(json).unwrap();
        let detail = ExternalDetail::from(details);
        assert_eq!(detail.external_id, "27205");
        assert_eq!(detail.cast.len(), 2);
        assert_eq!(detail.cast[0].name, "Leonardo DiCaprio");
        assert_eq!(detail.cast[0].character, "Cobb");
        assert_eq!(detail.release_year(), Some(2010));
    }

    #[test]
    fn test_tmdb_details_deserialization_without_credits() {
        let json = r#"{"id": 42, "title": "Bare Bones"}"#;
        let details: TmdbDetailsResponse = serde_json::from_str(json).unwrap();
        let detail = ExternalDetail::from(details);
        assert_eq!(detail.cast.len(), 0);
        assert_eq!(detail.overview, None);
    }
}
