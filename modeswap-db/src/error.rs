use thiserror::Error;
use tokio_rusqlite::rusqlite;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("identity conflict: {uuid} or {username} ({mode}) is already stored")]
    IdentityConflict {
        uuid: String,
        username: String,
        mode: &'static str,
    },

    #[error("identity not found")]
    IdentityNotFound,

    #[error("invalid identity row: {0}")]
    InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
