//! Database connections
//!
//! The loader talks to SQLite or PostgreSQL through sqlx's `Any` driver; the
//! backend is picked from the URL scheme and only matters where the two
//! dialects disagree (column types, catalog queries, clearing a table).

use anyhow::{Context, Result};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::error::{EtlError, EtlResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    /// Backend for a sqlx connection URL
    pub fn from_url(url: &str) -> EtlResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            _ => Err(EtlError::invalid_argument(format!(
                "Unsupported database URL '{}': use sqlite:// or postgres://",
                url
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }

    /// Statement emptying `table` inside a transaction
    pub fn clear_sql(&self, table: &str) -> String {
        match self {
            Backend::Sqlite => format!("DELETE FROM {}", table),
            Backend::Postgres => format!("TRUNCATE TABLE {}", table),
        }
    }

    /// Query listing the column names of `table` as `name`
    pub fn columns_sql(&self, table: &str) -> String {
        match self {
            Backend::Sqlite => format!("SELECT name FROM pragma_table_info('{}')", table),
            Backend::Postgres => format!(
                "SELECT column_name::text AS name FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = '{}'",
                table
            ),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQLite URLs get `mode=rwc` so a missing database file is created
fn connect_url(url: &str, backend: Backend) -> String {
    if backend != Backend::Sqlite || url.contains(":memory:") || url.contains("mode=") {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}mode=rwc", url, sep)
}

/// Open a pool for `url`.
///
/// In-memory SQLite databases get a single connection so every query sees
/// the same database.
pub async fn connect(url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let backend = Backend::from_url(url)?;

    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    log::debug!("Connecting to {} database ({} connections)", backend, max_connections);

    AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(&connect_url(url, backend))
        .await
        .with_context(|| format!("Failed to connect to database: {}", url))
}
