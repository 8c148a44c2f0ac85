//! Directory scan and the kind -> files index it produces.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{ManagerError, Result};
use crate::files::{FileKind, KindRegistry, ManagedFile, find_uuid, to_posix};

/// Snapshot of one scan: the classified files of every kind, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    files: BTreeMap<FileKind, Vec<ManagedFile>>,
}

impl FileIndex {
    pub fn get(&self, kind: FileKind) -> &[ManagedFile] {
        self.files.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every file, kind by kind.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedFile> {
        self.files.values().flatten()
    }

    pub fn into_files(self) -> impl Iterator<Item = ManagedFile> {
        self.files.into_values().flatten()
    }

    fn push(&mut self, file: ManagedFile) {
        self.files.entry(file.kind()).or_default().push(file);
    }
}

/// Walks a server directory and classifies every per-player file in it.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    kinds: KindRegistry,
    index: FileIndex,
}

impl FileRegistry {
    pub fn new(kinds: KindRegistry) -> Self {
        Self {
            kinds,
            index: FileIndex::default(),
        }
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Index of the latest scan.
    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Scans `root` recursively, replacing the previous index.
    ///
    /// Any unreadable entry aborts the scan: a partial index would let a
    /// player lose files silently during a rename.
    pub fn scan(&mut self, root: &Path) -> Result<&FileIndex> {
        debug!(root = %root.display(), "scanning player files");
        self.index = FileIndex::default();

        let mut index = FileIndex::default();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if find_uuid(&to_posix(relative)).is_none() {
                continue;
            }

            match self.kinds.classify(root, path) {
                Some(file) => {
                    trace!(file = %file, "classified");
                    index.push(file);
                }
                None => trace!(path = %path.display(), "unidentified file with uuid"),
            }
        }

        info!(files = index.len(), "player files scanned");
        self.index = index;
        Ok(&self.index)
    }

    /// Renames `file` so its basename becomes `new_uuid`, keeping the
    /// extension, and updates its in-memory path.
    ///
    /// Fails without touching anything if the target already exists or the
    /// source is gone.
    pub fn rename_managed_file(file: &mut ManagedFile, new_uuid: Uuid) -> Result<()> {
        let new_path = renamed_path(file.path(), new_uuid);
        debug!(from = %file.as_posix(), to = %to_posix(&new_path), "changing file uuid");

        match fs::symlink_metadata(&new_path) {
            Ok(_) => {
                return Err(ManagerError::io(
                    "rename onto existing",
                    new_path,
                    io::Error::from(io::ErrorKind::AlreadyExists),
                ));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(ManagerError::io("inspect", new_path, err)),
        }

        fs::rename(file.path(), &new_path)
            .map_err(|err| ManagerError::io("rename", file.path(), err))?;
        file.set_path(new_path);
        Ok(())
    }
}

/// `dir/<old>.ext` -> `dir/<new_uuid>.ext`
pub fn renamed_path(path: &Path, new_uuid: Uuid) -> PathBuf {
    let name = match path.extension() {
        Some(ext) => format!("{new_uuid}.{}", ext.to_string_lossy()),
        None => new_uuid.to_string(),
    };
    path.with_file_name(name)
}
