use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates the PostgreSQL connection pool
///
/// Ratings and catalog correctness rely on this database's unique constraints
/// (see the migrations), so there is no in-process locking anywhere above it.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}
