//! Pooled Postgres connections for the repositories in this module.
//!
//! Self-contained, like `schema.rs`: grounded on `ServiceConnectionPool`'s
//! `new`/`get_connection` shape (builder config, `spawn_blocking`-friendly
//! `PooledConnection` handed back on a plain `.await`), without that type's
//! tenant-manager and service-isolation coupling, which this engine's
//! repositories never need.

use diesel::pg::PgConnection;
use diesel::r2d2::{Builder, ConnectionManager, Pool, PooledConnection};
use std::time::Duration;
use workflow_engine_core::compozy::error::{CompozyError, Result};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
}

impl PoolConfig {
    pub fn new(database_url: String) -> Self {
        Self { database_url, max_connections: 20, min_connections: 5, connection_timeout: Duration::from_secs(30) }
    }
}

/// r2d2-backed connection pool handed to each repository.
pub struct ConnectionPool {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let pool = Builder::new()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| CompozyError::Transient { message: format!("failed to build connection pool: {e}") })?;
        Ok(Self { pool })
    }

    pub async fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool.get().map_err(|e| CompozyError::Transient { message: format!("failed to get connection: {e}") })
    }
}
