//! Pooled SQLite connections with scoped checkout.
//!
//! Pooling itself is r2d2's; this module configures each new connection and
//! wraps checkouts in a [`Session`]. A session dropped while a transaction is
//! still open rolls it back before the connection goes back to the pool.

use r2d2::{HandleError, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};

use crate::config::StoreConfig;
use crate::error::{QuakeError, Result};

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub max_size: usize,
}

#[derive(Clone, Debug)]
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
    config: StoreConfig,
}

/// Routes connection failures seen by r2d2 into tracing
#[derive(Debug)]
struct TracingErrorHandler;

impl HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        tracing::warn!(error = %error, "failed to open pooled connection");
    }
}

impl ConnectionPool {
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(QuakeError::invalid("pool_size", "must be at least 1"));
        }
        let max_size = u32::try_from(config.pool_size)
            .map_err(|_| QuakeError::invalid("pool_size", "too large"))?;

        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&config.db_path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));

        // Connections open lazily so construction never blocks on the file
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(0))
            .connection_timeout(config.acquire_timeout)
            .error_handler(Box::new(TracingErrorHandler))
            .build(manager)?;

        tracing::debug!(
            path = %config.db_path.display(),
            max_size,
            "connection pool ready"
        );
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Check out a connection, opening one if the pool has room.
    ///
    /// Waits up to `acquire_timeout` when every connection is in use.
    pub fn acquire(&self) -> Result<Session> {
        let conn = self.pool.get()?;
        Ok(Session { conn })
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            idle: state.idle_connections as usize,
            in_use: state.connections.saturating_sub(state.idle_connections) as usize,
            max_size: self.config.pool_size,
        }
    }
}

/// Pragmas applied to every new connection
fn configure_connection(
    conn: &mut Connection,
    busy_timeout: std::time::Duration,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// A checked-out connection, returned to its pool on drop
pub struct Session {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("autocommit", &self.conn.is_autocommit())
            .finish()
    }
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.conn.is_autocommit() {
            return;
        }

        tracing::warn!("rolling back transaction left open on a released session");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "rollback on release failed");
        }
    }
}
