// src/db/mod.rs
use std::path::Path;
use thiserror::Error;

pub mod mysql;
#[cfg(test)]
pub(crate) mod recording;

pub use self::mysql::MySqlSession;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Driver(#[from] ::mysql::Error),

    /// Failures raised by the session itself rather than by the server.
    #[error("{0}")]
    Session(String),
}

/// The pipeline's view of one open database connection.
///
/// Work done through `execute` and `load_local_file` only becomes durable at
/// `commit`. Implementations must not autocommit.
pub trait Session {
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Run a `LOAD DATA LOCAL INFILE` statement whose file is `path`. The
    /// session serves that file and nothing else to the server.
    fn load_local_file(&mut self, sql: &str, path: &Path) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    /// Drop whatever has been executed since the last commit. First half of
    /// teardown.
    fn discard_uncommitted(&mut self) -> Result<(), DbError>;

    /// Release the connection. Second half of teardown; called once.
    fn close(&mut self) -> Result<(), DbError>;
}
