//! SQLite persistence for fax jobs.
//!
//! One rusqlite connection per process, behind a `Mutex`, so each store
//! operation runs as a single locked statement. The engine and the admin
//! commands (`retry`, `clear-all`, ...) usually run as separate processes
//! on the same file: WAL lets readers proceed during a write, and a
//! `busy_timeout` makes the second writer wait instead of failing with
//! `SQLITE_BUSY`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// How long a write waits for another process's lock on the file.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Shared handle to the job database. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the job database, creating it on first use, and brings the
    /// `fax_jobs` schema up to date.
    ///
    /// The default location (`~/.faxqueue/data/`) does not exist on a fresh
    /// install, so missing parent directories are created.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={};",
            BUSY_TIMEOUT_MS
        ))?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database with the full schema, for tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked. Used by `job_repo` for every
    /// statement.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the default database path: `~/.faxqueue/data/faxqueue.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".faxqueue").join("data").join("faxqueue.db"))
}
