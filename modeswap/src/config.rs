use std::cell::OnceCell;
use std::env::var;
use std::path::{Path, PathBuf};

use dotenvy::dotenv;
use tracing::debug;

use crate::error::{ManagerError, Result};
use crate::properties::PROPERTIES_FILE;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Minecraft server directory, the one holding `server.properties`
    /// Env: SERVER_PATH (no default, may be given with --server-path instead)
    pub server_path: Option<PathBuf>,

    /// Identity database file path
    /// Env: DATABASE_PATH (default: "modeswap.db")
    pub database_path: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv();
        Self {
            server_path: var("SERVER_PATH").ok().map(PathBuf::from),
            database_path: env_or_default_string("DATABASE_PATH", "modeswap.db"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_path: None,
            database_path: "modeswap.db".to_string(),
        }
    }
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

/// Tells the engine where the server directory is.
pub trait ServerRootResolver {
    fn root_path(&self) -> Result<PathBuf>;
}

/// Resolver over a configured path. The path is validated and made absolute
/// on first use, then served from the cache.
#[derive(Debug, Default)]
pub struct ServerRoot {
    configured: Option<PathBuf>,
    resolved: OnceCell<PathBuf>,
}

impl ServerRoot {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            resolved: OnceCell::new(),
        }
    }

    fn resolve(configured: &Path) -> Result<PathBuf> {
        let root = configured
            .canonicalize()
            .map_err(|err| ManagerError::ServerPath(format!("{}: {err}", configured.display())))?;
        if !root.join(PROPERTIES_FILE).is_file() {
            return Err(ManagerError::ServerPath(format!(
                "{} has no {PROPERTIES_FILE}",
                root.display()
            )));
        }
        debug!(root = %root.display(), "server root resolved");
        Ok(root)
    }
}

impl ServerRootResolver for ServerRoot {
    fn root_path(&self) -> Result<PathBuf> {
        if let Some(root) = self.resolved.get() {
            return Ok(root.clone());
        }

        let configured = self.configured.as_deref().ok_or_else(|| {
            ManagerError::ServerPath("not configured, set SERVER_PATH or pass --server-path".to_string())
        })?;
        let root = Self::resolve(configured)?;
        Ok(self.resolved.get_or_init(|| root).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_path, None);
        assert_eq!(config.database_path, "modeswap.db");
    }

    #[test]
    fn test_root_requires_properties_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = ServerRoot::new(Some(dir.path().to_path_buf()));
        assert!(matches!(root.root_path(), Err(ManagerError::ServerPath(_))));

        fs::write(dir.path().join(PROPERTIES_FILE), "online-mode=true\n").unwrap();
        assert_eq!(root.root_path().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_root_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PROPERTIES_FILE), "online-mode=true\n").unwrap();
        let root = ServerRoot::new(Some(dir.path().to_path_buf()));

        let first = root.root_path().unwrap();
        fs::remove_file(dir.path().join(PROPERTIES_FILE)).unwrap();
        assert_eq!(root.root_path().unwrap(), first);
    }

    #[test]
    fn test_unconfigured_root() {
        let root = ServerRoot::default();
        assert!(matches!(root.root_path(), Err(ManagerError::ServerPath(_))));
    }
}
