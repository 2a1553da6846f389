mod queries;

pub use queries::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Pool sizing mirrors the original pgxpool configuration: bounded max
/// connections, no warm minimum, hour-long max lifetime, half-hour idle
/// timeout, five-second connect timeout.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(0)
        .max_lifetime(Some(Duration::from_secs(60 * 60)))
        .idle_timeout(Some(Duration::from_secs(30 * 60)))
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
