use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{MovieDetail, PagedMovies, SearchEntry, TrendingEntry, UserId};
use crate::state::AppState;
use crate::store::CatalogPage;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: String,
}

/// Handler for the merged local+external search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<SearchEntry>>> {
    let entries = state.resolver.resolve_search(&params.query).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    user_id: Option<UserId>,
}

/// Handler for the local-or-external detail lookup
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DetailParams>,
) -> AppResult<Json<MovieDetail>> {
    let detail = state.resolver.get_detail(&id, params.user_id).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    min_rating: Option<f64>,
    max_rating: Option<f64>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    25
}

/// Handler for the paged catalog listing
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PagedMovies>> {
    let page = CatalogPage {
        page: params.page.max(1),
        page_size: params.page_size.clamp(1, 100),
        min_rating: params.min_rating,
        max_rating: params.max_rating,
    };
    let movies = state.catalog.list(page).await?;
    Ok(Json(movies))
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    #[serde(default = "default_trending_limit")]
    limit: usize,
}

fn default_trending_limit() -> usize {
    20
}

/// Handler for the locally-ranked trending view
pub async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> AppResult<Json<Vec<TrendingEntry>>> {
    let entries = state.aggregation.trending(params.limit).await?;
    Ok(Json(entries))
}

/// Handler for the provider's trending feed (not-yet-ingested hits)
pub async fn discover(State(state): State<AppState>) -> AppResult<Json<Vec<SearchEntry>>> {
    let hits = state.provider.trending().await?;
    Ok(Json(hits.into_iter().map(SearchEntry::from).collect()))
}
