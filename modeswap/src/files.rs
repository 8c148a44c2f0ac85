//! Per-player data files and how a path is recognised as one.

use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{ManagerError, Result};

/// Length of the canonical 8-4-4-4-12 textual uuid.
const UUID_LEN: usize = 36;

/// The fixed set of per-player file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileKind {
    /// `playerdata/<uuid>.dat`: inventory, ender chest, health, position...
    PlayerData,
    /// `stats/<uuid>.json`
    Stats,
    /// `advancements/<uuid>.json`
    Advancements,
}

impl FileKind {
    /// Every kind a complete player owns, in registration order.
    pub const ALL: [FileKind; 3] = [FileKind::PlayerData, FileKind::Stats, FileKind::Advancements];

    /// Tag searched for in a path: the kind's name lower-cased, without any
    /// `file` suffix.
    pub fn tag(self) -> &'static str {
        match self {
            FileKind::PlayerData => "playerdata",
            FileKind::Stats => "stats",
            FileKind::Advancements => "advancements",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::PlayerData => "player data",
            FileKind::Stats => "stats",
            FileKind::Advancements => "advancements",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One file holding a slice of a player's data.
///
/// `path` is used for I/O. Classification and the uuid only look at the part
/// of it below `root`, so the server directory's own name never matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    path: PathBuf,
    root: PathBuf,
    kind: FileKind,
}

impl ManagedFile {
    pub fn new(kind: FileKind, path: impl Into<PathBuf>) -> Self {
        Self::under_root(kind, PathBuf::new(), path)
    }

    /// File found while scanning `root`.
    pub fn under_root(kind: FileKind, root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: root.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path below the scan root; the whole path when it was built without one.
    pub fn relative_path(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Path with forward slashes, the form classification works on.
    pub fn as_posix(&self) -> String {
        to_posix(&self.path)
    }

    /// Uuid embedded in the path below the root (first occurrence).
    pub fn uuid(&self) -> Result<Uuid> {
        find_uuid(&to_posix(self.relative_path()))
            .map(|(_, uuid)| uuid)
            .ok_or_else(|| ManagerError::InvalidFile {
                path: self.path.clone(),
            })
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }
}

impl fmt::Display for ManagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.as_posix())
    }
}

/// One registered kind: the tag it is matched by and the kind it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindEntry {
    pub tag: &'static str,
    pub kind: FileKind,
}

impl KindEntry {
    fn matches(&self, posix_path: &str) -> bool {
        posix_path.contains(self.tag)
    }

    fn build(&self, root: &Path, path: &Path) -> ManagedFile {
        ManagedFile::under_root(self.kind, root, path)
    }
}

/// Ordered list of known file kinds. The first entry whose tag appears in a
/// path wins, so the order is part of the classification rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRegistry {
    entries: Vec<KindEntry>,
}

impl KindRegistry {
    /// Player data, stats, advancements.
    pub fn standard() -> Self {
        Self::from_kinds(FileKind::ALL)
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = FileKind>) -> Self {
        Self {
            entries: kinds
                .into_iter()
                .map(|kind| KindEntry {
                    tag: kind.tag(),
                    kind,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[KindEntry] {
        &self.entries
    }

    /// Returns the file for the first matching kind, or `None` when the path
    /// is not a known per-player file. Only the part of `path` below `root`
    /// is matched.
    pub fn classify(&self, root: &Path, path: &Path) -> Option<ManagedFile> {
        let posix = to_posix(path.strip_prefix(root).unwrap_or(path));
        self.entries
            .iter()
            .find(|entry| entry.matches(&posix))
            .map(|entry| entry.build(root, path))
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Finds the first canonical textual uuid in `haystack`, case-insensitive.
/// Returns the matched substring and its parsed value.
pub fn find_uuid(haystack: &str) -> Option<(&str, Uuid)> {
    let start = haystack
        .as_bytes()
        .windows(UUID_LEN)
        .position(is_canonical_uuid)?;
    // The window is pure ASCII, so both ends sit on char boundaries.
    let text = &haystack[start..start + UUID_LEN];
    Uuid::parse_str(text).ok().map(|uuid| (text, uuid))
}

fn is_canonical_uuid(bytes: &[u8]) -> bool {
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

pub(crate) fn to_posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
