//! SQLite backend for the settlement engine.

mod db;
mod errors;

pub mod ledger;
pub mod payments;
pub mod payouts;
pub mod refunds;
pub mod sellers;
pub mod splits;

use std::env;

pub use db::{SqliteDatabase, PLATFORM_ACCOUNT, TAX_ACCOUNT};
pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

const SQLITE_DB_URL: &str = "sqlite://data/marketplace_payments.db";

pub fn db_url() -> String {
    let result = env::var("MPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("MPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = url
        .parse::<SqliteConnectOptions>()
        .map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteDatabaseError> {
    sqlx::migrate!("./src/db/sqlite/migrations")
        .run(pool)
        .await
        .map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))
}
