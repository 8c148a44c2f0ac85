use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Identity lookup miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("no identity stored for uuid {0}")]
    Uuid(Uuid),

    #[error("no {mode} identity stored for username {username:?}")]
    Username { username: String, mode: &'static str },
}

/// Which consistency invariant stayed broken after remediation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckFailure {
    #[error("online mode check failed, players that could not be removed: {}", .blocked.join(", "))]
    OnlineMode { blocked: Vec<String> },

    #[error("duplicates check failed, players that could not be removed: {}", .blocked.join(", "))]
    Duplicates { blocked: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{} does not contain a uuid", .path.display())]
    InvalidFile { path: PathBuf },

    #[error("invalid player {uuid}: {reason}")]
    InvalidPlayer { uuid: Uuid, reason: String },

    #[error("identity lookup failed: {0}")]
    Search(#[from] SearchError),

    #[error("players check failed: {0}")]
    CheckFailed(#[from] CheckFailure),

    #[error("player {username} ({uuid}) is already using online-mode={online}")]
    StateViolation {
        username: String,
        uuid: Uuid,
        online: bool,
    },

    #[error("server is already running with online-mode={0}")]
    AlreadySet(bool),

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan server directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid properties file {}: {reason}", .path.display())]
    Property { path: PathBuf, reason: String },

    #[error("invalid server path: {0}")]
    ServerPath(String),

    #[error("unreadable player data {}: {reason}", .path.display())]
    PlayerData { path: PathBuf, reason: String },

    #[error("username {username} has more than one {mode} identity")]
    DuplicateIdentity { username: String, mode: &'static str },

    #[error("switch stopped at player {username} after {migrated} players were migrated: {source}")]
    PartialMigration {
        username: String,
        migrated: usize,
        #[source]
        source: Box<ManagerError>,
    },

    #[error("failed to encode whitelist: {0}")]
    Whitelist(#[from] serde_json::Error),
}

impl ManagerError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManagerError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failure_names_blocked_players() {
        let err = ManagerError::from(CheckFailure::OnlineMode {
            blocked: vec!["bob|offline".to_string(), "eve|offline".to_string()],
        });
        assert_eq!(
            err.to_string(),
            "players check failed: online mode check failed, players that could not be removed: bob|offline, eve|offline"
        );
    }

    #[test]
    fn test_search_error_message() {
        let err = SearchError::Username {
            username: "carol".to_string(),
            mode: "online",
        };
        assert_eq!(
            err.to_string(),
            "no online identity stored for username \"carol\""
        );
    }

    #[test]
    fn test_io_error_names_path() {
        let err = ManagerError::io(
            "rename",
            "world/stats/x.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().starts_with("failed to rename world/stats/x.json"));
    }
}
