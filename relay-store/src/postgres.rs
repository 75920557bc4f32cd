//! PostgreSQL-backed activity log
//!
//! Connection pooling uses deadpool-postgres. The schema is embedded and
//! installed idempotently at startup so a fresh database self-provisions
//! its two tables.

use crate::record::{ActivityRecord, LogRecord};
use crate::ActivityStore;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use relay_core::{env_parse, env_string, StoreError};
use std::time::{Duration, Instant};
use tokio_postgres::NoTls;
use uuid::Uuid;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Log store connection configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "relay".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 8,
        }
    }
}

impl StoreConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_DB_HOST`: PostgreSQL host (default: localhost)
    /// - `RELAY_DB_PORT`: PostgreSQL port (default: 5432)
    /// - `RELAY_DB_NAME`: database name (default: relay)
    /// - `RELAY_DB_USER`: database user (default: postgres)
    /// - `RELAY_DB_PASSWORD`: database password (default: empty)
    /// - `RELAY_DB_POOL_SIZE`: maximum pool size (default: 8)
    pub fn from_env() -> Self {
        Self {
            host: env_string("RELAY_DB_HOST", "localhost"),
            port: env_parse("RELAY_DB_PORT", 5432),
            dbname: env_string("RELAY_DB_NAME", "relay"),
            user: env_string("RELAY_DB_USER", "postgres"),
            password: env_string("RELAY_DB_PASSWORD", ""),
            max_size: env_parse("RELAY_DB_POOL_SIZE", 8),
        }
    }

    /// Create a connection pool from this configuration.
    fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::ConnectFailed {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Embedded DDL for the two append-only tables. Idempotent.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
    id UUID PRIMARY KEY,
    from_agent TEXT NOT NULL,
    to_agent TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('task', 'question', 'response', 'status', 'progress', 'error')),
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS logs (
    id UUID PRIMARY KEY,
    agent TEXT NOT NULL,
    level TEXT NOT NULL CHECK (level IN ('debug', 'info', 'warn', 'error', 'fatal')),
    message TEXT NOT NULL,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

// ============================================================================
// STORE
// ============================================================================

/// Activity log backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Connect and install the schema.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = config.create_pool()?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Install the two tables if they do not exist yet.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| StoreError::ConnectFailed {
                reason: format!("Failed to install schema: {}", e),
            })
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::ConnectFailed {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ActivityStore for PostgresStore {
    async fn record_activity(&self, activity: ActivityRecord) -> Result<(), StoreError> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO activities (id, from_agent, to_agent, type, payload) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &Uuid::new_v4(),
                    &activity.from_agent,
                    &activity.to_agent,
                    &activity.kind.as_str(),
                    &activity.payload,
                ],
            )
            .await
            .map_err(|e| StoreError::InsertFailed {
                table: "activities",
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn record_log(&self, log: LogRecord) -> Result<(), StoreError> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO logs (id, agent, level, message, metadata) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &Uuid::new_v4(),
                    &log.agent,
                    &log.level.as_str(),
                    &log.message,
                    &log.metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::InsertFailed {
                table: "logs",
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let client = self.client().await.map_err(|e| StoreError::HealthCheckFailed {
            reason: e.to_string(),
        })?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| StoreError::HealthCheckFailed {
                reason: e.to_string(),
            })?;
        Ok(start.elapsed())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "relay");
        assert_eq!(config.max_size, 8);
    }

    #[test]
    fn test_schema_constrains_enums() {
        // The DDL must reject kinds and levels outside the wire enums.
        assert!(SCHEMA.contains("'task', 'question', 'response', 'status', 'progress', 'error'"));
        assert!(SCHEMA.contains("'debug', 'info', 'warn', 'error', 'fatal'"));
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod db_tests {
    use super::*;
    use relay_core::MessageKind;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_rows_against_live_database() {
        let store = PostgresStore::connect(&StoreConfig::from_env())
            .await
            .expect("postgres reachable for db-tests");

        store
            .record_activity(ActivityRecord::new(
                "human",
                "chatter",
                MessageKind::Question,
                json!({"content": "hi"}),
            ))
            .await
            .expect("activity insert");

        store
            .record_log(crate::LogRecord::new(
                "gateway",
                crate::LogLevel::Info,
                "db-tests probe",
            ))
            .await
            .expect("log insert");

        let latency = store.health_check().await.expect("health check");
        assert!(latency < Duration::from_secs(2));
    }
}
