//! DuckDB connection pool
//!
//! DuckDB hands out extra connections to an open database through
//! `try_clone`. The pool keeps one root connection, clones it on demand up to
//! `pool_size`, and parks returned connections for reuse. A semaphore bounds
//! the number of connections checked out at once.
//!
//! DuckDB commits optimistically: two transactions on cloned connections that
//! write the same primary key conflict at commit. Writes therefore go through
//! [`ConnectionPool::with_writer`], which holds the pool's write lock for the
//! duration of the work.

use super::types::StoreConfig;
use crate::error::{Error, Result};
use duckdb::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Bounded pool of DuckDB connections
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    writer: Arc<AsyncMutex<()>>,
    size: usize,
    checkout_timeout: Duration,
    path: String,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("path", &self.inner.path)
            .field("size", &self.inner.size)
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Open the database described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(Error::invalid_value(
                "database.pool_size",
                "must be at least 1",
            ));
        }

        let root = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(|e| Error::pool(format!("Failed to open {}: {e}", config.path)))?;

        debug!(path = %config.path, size = config.pool_size, "Opened connection pool");

        Ok(Self {
            inner: Arc::new(PoolInner {
                root: Mutex::new(root),
                idle: Mutex::new(Vec::with_capacity(config.pool_size)),
                permits: Arc::new(Semaphore::new(config.pool_size)),
                writer: Arc::new(AsyncMutex::new(())),
                size: config.pool_size,
                checkout_timeout: config.checkout_timeout(),
                path: config.path.clone(),
            }),
        })
    }

    /// Maximum number of connections checked out at once
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Connections that could be checked out right now
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Check out a connection, waiting up to the checkout timeout
    pub async fn checkout(&self) -> Result<PooledConnection> {
        let permit = tokio::time::timeout(
            self.inner.checkout_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            warn!(
                timeout_secs = self.inner.checkout_timeout.as_secs(),
                "Timed out waiting for a database connection"
            );
            Error::pool(format!(
                "no connection available within {}s",
                self.inner.checkout_timeout.as_secs()
            ))
        })?
        .map_err(|_| Error::pool("pool is closed"))?;

        let parked = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let conn = match parked {
            Some(conn) => conn,
            None => self
                .inner
                .root
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_clone()
                .map_err(|e| Error::pool(format!("Failed to open connection: {e}")))?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Run blocking database work on a checked-out connection
    pub async fn with_connection<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.checkout().await?;
        tokio::task::spawn_blocking(move || work(&mut *conn)).await?
    }

    /// Run blocking write work while holding the pool's write lock
    ///
    /// Writers run one at a time, so upserts that touch the same key commit
    /// in sequence instead of failing with a transaction conflict.
    pub async fn with_writer<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let lock = Arc::clone(&self.inner.writer).lock_owned().await;
        let mut conn = self.checkout().await?;
        tokio::task::spawn_blocking(move || {
            let _lock = lock;
            work(&mut *conn)
        })
        .await?
    }
}

/// A checked-out connection; returned to the pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conn);
        }
        // `_permit` is released after this, so the connection is parked first
    }
}
