use std::path::PathBuf;
use thiserror::Error;

/// Failures of the SQLite job database. The store layer wraps these in
/// `StoreError::Database`, which the dispatch engine treats as transient.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The data directory for a new database file could not be created.
    #[error("Cannot create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A `fax_jobs` row holds a status code or timestamp the job model
    /// cannot represent.
    #[error("Corrupt row for job {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    /// A thread panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}
