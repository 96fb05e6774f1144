//! Store connection pool and schema provisioning
//!
//! The pool is created once at process start, handed to whoever needs it and
//! closed explicitly at shutdown. `SqlitePool` is a cheap, clonable handle.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;
use crate::error::EtlResult;

/// Migrations embedded at compile time from `crates/dex-etl/migrations`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connect a pool; the database file is created when missing
pub async fn create_pool(config: &DatabaseConfig) -> EtlResult<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(idle_timeout);
    }

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }

    let pool = options.connect_with(connect_options).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Create or upgrade the catalog tables; safe to call on every run
pub async fn provision_schema(pool: &SqlitePool) -> EtlResult<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> EtlResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Wait for checked-out connections to return, then close the pool
pub async fn close_pool(pool: &SqlitePool) {
    pool.close().await;
    tracing::info!("Database connection pool closed");
}
