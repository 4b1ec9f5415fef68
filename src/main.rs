use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cinelog_api::config::Config;
use cinelog_api::db;
use cinelog_api::routes::create_router;
use cinelog_api::services::providers::tmdb::TmdbProvider;
use cinelog_api::state::AppState;
use cinelog_api::store::{PgMovieCatalog, PgRatingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let redis_client = db::create_redis_client(&config.redis_url)?;
    let cache = db::Cache::new(redis_client);

    let provider = Arc::new(TmdbProvider::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    )?);
    let catalog = Arc::new(PgMovieCatalog::new(pool.clone()));
    let ratings = Arc::new(PgRatingStore::new(pool));

    let state = AppState::new(catalog, ratings, provider);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "cinelog API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
