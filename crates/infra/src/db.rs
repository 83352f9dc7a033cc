//! Connection pool and schema bootstrap.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

/// Idempotent DDL for the three tables.
pub const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Open a connection pool and verify the server is reachable.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url())
        .await?;
    info!(
        host = %config.host,
        database = %config.database,
        max_connections = config.max_connections,
        "connected to postgres"
    );
    Ok(pool)
}

/// Create the tables and indexes if they do not exist yet.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("schema bootstrap complete");
    Ok(())
}
