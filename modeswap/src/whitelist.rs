//! `whitelist.json` generated from the identity table.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;
use tracing::info;
use uuid::Uuid;

use crate::error::{ManagerError, Result};
use crate::identity::IdentityTable;

pub const WHITELIST_FILE: &str = "whitelist.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhitelistEntry {
    pub uuid: Uuid,
    pub name: String,
}

/// One entry per identity of the given mode, sorted by name.
pub fn whitelist_entries(identities: &IdentityTable, online: bool) -> Vec<WhitelistEntry> {
    identities
        .identities()
        .into_iter()
        .filter(|identity| identity.online == online)
        .map(|identity| WhitelistEntry {
            uuid: identity.uuid,
            name: identity.username.to_string(),
        })
        .collect()
}

/// Four-space indented JSON array, as the server writes it.
pub fn render_whitelist(entries: &[WhitelistEntry]) -> Result<String> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    entries.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Overwrites `<root>/whitelist.json`.
pub fn write_whitelist(root: &Path, entries: &[WhitelistEntry]) -> Result<PathBuf> {
    let path = root.join(WHITELIST_FILE);
    let mut contents = render_whitelist(entries)?;
    contents.push('\n');
    fs::write(&path, contents).map_err(|err| ManagerError::io("write", &path, err))?;

    info!(path = %path.display(), entries = entries.len(), "whitelist written");
    Ok(path)
}
