//! Database connection module for `ClickHouse`.
//!
//! Provides the `ClickHouse` client and the [`Executor`] implementation the
//! query engine runs compiled SQL through. Rows come back as JSON maps
//! (`JSONEachRow`), since the shape of a compiled query is only known at
//! runtime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clickhouse::Client;
use shared::srql::{ExecutionError, Executor, Row, SqlValue};
use std::sync::Arc;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `ClickHouse` database URL (e.g. <http://localhost:8123>)
    pub url: String,
    /// Database name to use
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: String,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIGHTLINE_DB_URL`: Database URL (default: <http://localhost:8123>)
    /// - `SIGHTLINE_DB_NAME`: Database name (default: "sightline")
    /// - `SIGHTLINE_DB_USER`: Database user (default: "sightline")
    /// - `SIGHTLINE_DB_PASSWORD`: Database password (default: "`sightline_dev`")
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables cannot be read.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: std::env::var("SIGHTLINE_DB_URL")
                .unwrap_or_else(|_| "http://localhost:8123".to_string()),
            database: std::env::var("SIGHTLINE_DB_NAME")
                .unwrap_or_else(|_| "sightline".to_string()),
            user: std::env::var("SIGHTLINE_DB_USER").unwrap_or_else(|_| "sightline".to_string()),
            password: std::env::var("SIGHTLINE_DB_PASSWORD")
                .unwrap_or_else(|_| "sightline_dev".to_string()),
        })
    }
}

/// Database client wrapper.
#[derive(Clone)]
pub struct Database {
    client: Arc<Client>,
}

impl Database {
    /// Create a new database client from configuration.
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying `ClickHouse` client.
    #[must_use]
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    /// An [`Executor`] running compiled queries against this database.
    #[must_use]
    pub fn executor(&self) -> ClickHouseExecutor {
        ClickHouseExecutor {
            client: Arc::clone(&self.client),
        }
    }

    /// Test database connectivity by executing a simple query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached or the query fails.
    pub async fn ping(&self) -> Result<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("Failed to ping database")?;
        Ok(())
    }
}

/// [`Executor`] implementation over the `ClickHouse` client.
#[derive(Clone)]
pub struct ClickHouseExecutor {
    client: Arc<Client>,
}

#[async_trait]
impl Executor for ClickHouseExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, ExecutionError> {
        let mut query = self.client.query(sql);
        for param in params {
            query = match param {
                SqlValue::Text(value) => query.bind(value.as_str()),
                SqlValue::Int(value) => query.bind(*value),
            };
        }

        let mut cursor = query
            .fetch_bytes("JSONEachRow")
            .map_err(|err| ExecutionError::Backend(err.to_string()))?;

        let mut payload = Vec::new();
        while let Some(chunk) = cursor
            .next()
            .await
            .map_err(|err| ExecutionError::Backend(err.to_string()))?
        {
            payload.extend_from_slice(&chunk);
        }

        let mut rows = Vec::new();
        for line in payload.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let row: Row = serde_json::from_slice(line)
                .map_err(|err| ExecutionError::Backend(format!("malformed result row: {err}")))?;
            rows.push(row);
        }

        Ok(rows)
    }
}
