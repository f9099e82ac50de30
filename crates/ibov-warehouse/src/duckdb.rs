//! `DuckDB` connection pool management.
//!
//! Every pooled connection is cloned from a single root connection so that all
//! of them share one database instance (and therefore one file lock). The lock
//! lives as long as the manager does: a read-write manager excludes every other
//! process, a read-only one only excludes writers.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::{Config, Connection};

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access. Enforced by the engine when the manager itself was
    /// opened read-only.
    ReadOnly,
    /// Read-write access.
    ReadWrite,
}

impl AccessMode {
    fn engine(self) -> ::duckdb::AccessMode {
        match self {
            Self::ReadOnly => ::duckdb::AccessMode::ReadOnly,
            Self::ReadWrite => ::duckdb::AccessMode::ReadWrite,
        }
    }
}

struct PoolState {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    mode: AccessMode,
    max_pool_size: usize,
    root: Mutex<Connection>,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock leaves the Vecs intact.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database file read-write and create a pool around it.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_pool_size: usize) -> Result<Self, ::duckdb::Error> {
        Self::open_with_mode(path, max_pool_size, AccessMode::ReadWrite)
    }

    /// Open the database file with an engine-level access mode.
    ///
    /// A read-only open never creates the file and takes a shared lock, so
    /// several read-only processes can hold the same database at once.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured,
    /// including when another process holds a conflicting lock.
    pub fn open_with_mode(
        path: impl Into<PathBuf>,
        max_pool_size: usize,
        mode: AccessMode,
    ) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open_with_flags(db_path.as_path(), engine_config(mode)?)?;
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                mode,
                max_pool_size: max_pool_size.max(1),
                root: Mutex::new(root),
                state: Mutex::new(PoolState {
                    read_only: Vec::new(),
                    read_write: Vec::new(),
                }),
            }),
        })
    }

    /// Acquire a connection from the pool, cloning a new one when it is empty.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be cloned or configured.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let pooled = {
            let mut state = self.inner.state();
            match mode {
                AccessMode::ReadOnly => state.read_only.pop(),
                AccessMode::ReadWrite => state.read_write.pop(),
            }
        };

        let connection = match pooled {
            Some(connection) => connection,
            None => {
                let root = self
                    .inner
                    .root
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let connection = root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    /// Engine-level access mode the database was opened with.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.inner.mode
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl PooledConnection {
    /// Mode the connection was acquired with.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the connection out.
        match self.connection.as_ref() {
            Some(connection) => connection,
            None => unreachable!("pooled connection accessed after drop"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.connection.as_mut() {
            Some(connection) => connection,
            None => unreachable!("pooled connection accessed after drop"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut state = self.pool.state();
        let slot = match self.mode {
            AccessMode::ReadOnly => &mut state.read_only,
            AccessMode::ReadWrite => &mut state.read_write,
        };
        if slot.len() < self.pool.max_pool_size {
            slot.push(connection);
        }
    }
}

// Extension autoloading would try to download from the network on first use.
fn engine_config(mode: AccessMode) -> Result<Config, ::duckdb::Error> {
    Config::default()
        .access_mode(mode.engine())?
        .enable_autoload_extension(false)
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
