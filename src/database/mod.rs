//! Database connection and range-allocation modules.
//!
//! The engine owns no global state; everything flows through a caller-built
//! [`sqlx::PgPool`]. [`DatabaseConfig`] exists for binaries and tests that
//! want the conventional environment-driven construction.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod allocator;
pub mod audit_log;
pub mod locks;

pub use allocator::next_starting_value;
pub use audit_log::{AuditLogRepository, AuditLogRow, NewAuditRecord};
pub use locks::{advisory_xact_lock, range_lock_keys, try_advisory_xact_lock};

/// Pool configuration, read from the environment by default.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/lsk".to_string()),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl DatabaseConfig {
    /// Build a pool from this configuration.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connection_timeout);
        if let Some(idle) = self.idle_timeout {
            options = options.idle_timeout(idle);
        }
        options.connect(&self.database_url).await
    }
}
