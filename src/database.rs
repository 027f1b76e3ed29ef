//! Data access plumbing shared by the Postgres repository.
//!
//! Statements never borrow a long-lived connection: each one checks a connection out
//! of the pool and hands it back when the future completes, and the pool replaces
//! connections that dropped. Failures are logged once here, with the SQL text and
//! bound params, then handed upward as a [`RepoError`].

use std::fmt::Debug;
use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{config::AppConfig, error::RepoError};

/// Builds the connection pool described by the configuration.
pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        // Liveness check on checkout; stale connections are dropped and reopened.
        .test_before_acquire(true)
        .connect(&config.db_url)
        .await
}

/// Logs a failed statement and wraps the driver error.
pub(crate) fn failure<P: Debug>(
    operation: &'static str,
    sql: &str,
    params: P,
    source: sqlx::Error,
) -> RepoError {
    tracing::error!(
        operation,
        query = %compact(sql),
        params = ?params,
        error = %source,
        "SQL statement failed"
    );
    RepoError::Database { operation, source }
}

// Collapses the indentation of multi-line SQL literals for single-line log records.
fn compact(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
