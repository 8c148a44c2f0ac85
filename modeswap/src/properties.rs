//! `server.properties` access, limited to the `online-mode` key.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ManagerError, Result};

pub const PROPERTIES_FILE: &str = "server.properties";
const ONLINE_MODE_KEY: &str = "online-mode";

/// Where the server's online-mode setting lives.
pub trait ModeStore {
    fn get_mode(&self) -> Result<bool>;

    fn set_mode(&mut self, online: bool) -> Result<()>;
}

/// `ModeStore` backed by a `server.properties` file.
///
/// The parsed mode is cached after the first read. `set_mode` writes the file
/// and refreshes the cache; edits made by anything else are not seen.
#[derive(Debug)]
pub struct ServerProperties {
    path: PathBuf,
    cached: Cell<Option<bool>>,
}

impl ServerProperties {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Cell::new(None),
        }
    }

    /// Properties file of the server rooted at `root`.
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(PROPERTIES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, reason: impl Into<String>) -> ManagerError {
        ManagerError::Property {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|err| self.invalid(format!("cannot read: {err}")))
    }
}

impl ModeStore for ServerProperties {
    fn get_mode(&self) -> Result<bool> {
        if let Some(online) = self.cached.get() {
            return Ok(online);
        }

        let contents = self.read()?;
        let raw = contents
            .lines()
            .find_map(|line| {
                let (key, value) = split_property(line)?;
                key.eq_ignore_ascii_case(ONLINE_MODE_KEY).then_some(value)
            })
            .ok_or_else(|| self.invalid(format!("missing {ONLINE_MODE_KEY} key")))?;
        let online = parse_bool(raw).ok_or_else(|| self.invalid(format!("{ONLINE_MODE_KEY}={raw} is not a boolean")))?;

        debug!(path = %self.path.display(), online, "online mode read");
        self.cached.set(Some(online));
        Ok(online)
    }

    fn set_mode(&mut self, online: bool) -> Result<()> {
        let contents = self.read()?;

        let mut found = false;
        let mut updated = String::with_capacity(contents.len());
        for line in contents.split_inclusive('\n') {
            let body = line.trim_end_matches(['\r', '\n']);
            match split_property(body) {
                Some((key, _)) if key.eq_ignore_ascii_case(ONLINE_MODE_KEY) => {
                    found = true;
                    updated.push_str(&format!("{key}={online}"));
                    updated.push_str(&line[body.len()..]);
                }
                _ => updated.push_str(line),
            }
        }
        if !found {
            return Err(self.invalid(format!("missing {ONLINE_MODE_KEY} key")));
        }

        fs::write(&self.path, updated).map_err(|err| ManagerError::io("write", &self.path, err))?;

        info!(path = %self.path.display(), online, "online mode written");
        self.cached.set(Some(online));
        Ok(())
    }
}

/// `key=value` (or `key:value`), ignoring comments and blank lines.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    let (key, value) = trimmed.split_once(['=', ':'])?;
    Some((key.trim(), value.trim()))
}

/// Lenient boolean, case-insensitive. Accepts the usual English spellings
/// plus `sí`/`si`/`s`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "t" | "on" | "y" | "1" | "sí" | "si" | "s" => Some(true),
        "no" | "false" | "f" | "off" | "n" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPERTIES: &str = "#Minecraft server properties\n\
        motd=A Minecraft Server\n\
        online-mode=false\n\
        max-players=20\n";

    fn fixture(contents: &str) -> (tempfile::TempDir, ServerProperties) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PROPERTIES_FILE), contents).unwrap();
        let properties = ServerProperties::in_root(dir.path());
        (dir, properties)
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["yes", "TRUE", "t", "On", "y", "1", "sí", "si", "S"] {
            assert_eq!(parse_bool(yes), Some(true), "{yes}");
        }
        for no in ["no", "False", "f", "OFF", "n", "0"] {
            assert_eq!(parse_bool(no), Some(false), "{no}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_get_mode() {
        let (_dir, properties) = fixture(PROPERTIES);
        assert!(!properties.get_mode().unwrap());
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let (_dir, properties) = fixture("Online-Mode = yes\n");
        assert!(properties.get_mode().unwrap());
    }

    #[test]
    fn test_mode_is_cached_until_written() {
        let (dir, mut properties) = fixture(PROPERTIES);
        assert!(!properties.get_mode().unwrap());

        // Outside edits are not seen through the cache
        fs::write(dir.path().join(PROPERTIES_FILE), "online-mode=true\n").unwrap();
        assert!(!properties.get_mode().unwrap());

        properties.set_mode(false).unwrap();
        assert!(!properties.get_mode().unwrap());
        assert_eq!(
            fs::read_to_string(properties.path()).unwrap(),
            "online-mode=false\n"
        );
    }

    #[test]
    fn test_set_mode_preserves_other_lines() {
        let (_dir, mut properties) = fixture(PROPERTIES);

        properties.set_mode(true).unwrap();

        assert!(properties.get_mode().unwrap());
        assert_eq!(
            fs::read_to_string(properties.path()).unwrap(),
            "#Minecraft server properties\nmotd=A Minecraft Server\nonline-mode=true\nmax-players=20\n"
        );
        assert!(ServerProperties::new(properties.path()).get_mode().unwrap());
    }

    #[test]
    fn test_set_mode_keeps_crlf_line_endings() {
        let (_dir, mut properties) = fixture("#Minecraft server properties\r\nonline-mode=true\r\nmotd=hi\r\n");

        properties.set_mode(false).unwrap();

        assert_eq!(
            fs::read_to_string(properties.path()).unwrap(),
            "#Minecraft server properties\r\nonline-mode=false\r\nmotd=hi\r\n"
        );
        assert!(!ServerProperties::new(properties.path()).get_mode().unwrap());
    }

    #[test]
    fn test_set_mode_on_last_line_without_newline() {
        let (_dir, mut properties) = fixture("motd=hi\nonline-mode=false");

        properties.set_mode(true).unwrap();

        assert_eq!(
            fs::read_to_string(properties.path()).unwrap(),
            "motd=hi\nonline-mode=true"
        );
    }

    #[test]
    fn test_missing_key_or_file() {
        let (_dir, mut properties) = fixture("motd=hi\n");
        assert!(matches!(properties.get_mode(), Err(ManagerError::Property { .. })));
        assert!(matches!(properties.set_mode(true), Err(ManagerError::Property { .. })));

        let dir = tempfile::tempdir().unwrap();
        let missing = ServerProperties::in_root(dir.path());
        assert!(matches!(missing.get_mode(), Err(ManagerError::Property { .. })));
    }

    #[test]
    fn test_unparseable_value() {
        let (_dir, properties) = fixture("online-mode=sometimes\n");
        assert!(matches!(properties.get_mode(), Err(ManagerError::Property { .. })));
    }
}
