//! Player records: one player's complete set of files plus its identity.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use modeswap_db::{PlayerIdentity, PlayerName, mode_label};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ManagerError, Result};
use crate::files::{FileKind, ManagedFile};
use crate::identity::IdentityLookup;
use crate::registry::FileRegistry;

/// A player with exactly one file of every required kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    uuid: Uuid,
    username: PlayerName,
    online: bool,
    player_data_file: ManagedFile,
    stats_file: ManagedFile,
    advancements_file: ManagedFile,
}

impl Player {
    /// Builds a player from its identity and its files. Every kind must be
    /// present exactly once and every file must carry the identity's uuid.
    pub fn new(identity: PlayerIdentity, files: Vec<ManagedFile>) -> Result<Self> {
        let uuid = identity.uuid;
        let invalid = |reason: String| ManagerError::InvalidPlayer { uuid, reason };

        let mut player_data_file = None;
        let mut stats_file = None;
        let mut advancements_file = None;

        for file in files {
            if file.uuid()? != uuid {
                return Err(invalid(format!("{file} belongs to another uuid")));
            }
            let slot = match file.kind() {
                FileKind::PlayerData => &mut player_data_file,
                FileKind::Stats => &mut stats_file,
                FileKind::Advancements => &mut advancements_file,
            };
            if let Some(existing) = slot {
                return Err(invalid(format!(
                    "more than one {} file: {existing} and {file}",
                    file.kind()
                )));
            }
            *slot = Some(file);
        }

        let missing = |kind: FileKind| {
            invalid(format!(
                "can't create player {:?} without {kind} file",
                identity.username.as_str()
            ))
        };

        Ok(Self {
            uuid,
            username: identity.username,
            online: identity.online,
            player_data_file: player_data_file.ok_or_else(|| missing(FileKind::PlayerData))?,
            stats_file: stats_file.ok_or_else(|| missing(FileKind::Stats))?,
            advancements_file: advancements_file.ok_or_else(|| missing(FileKind::Advancements))?,
        })
    }

    /// Builds a player, resolving its username and mode through `identities`.
    pub fn resolve(uuid: Uuid, files: Vec<ManagedFile>, identities: &dyn IdentityLookup) -> Result<Self> {
        // Structure first: a broken file group is reported as such even when
        // the uuid is also unknown.
        check_kinds(uuid, &files)?;
        let username = identities.username_of(uuid)?;
        let online = identities.mode_of(uuid)?;
        Self::new(PlayerIdentity::new(uuid, username, online), files)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity::new(self.uuid, self.username, self.online)
    }

    pub fn player_data_file(&self) -> &ManagedFile {
        &self.player_data_file
    }

    pub fn stats_file(&self) -> &ManagedFile {
        &self.stats_file
    }

    pub fn advancements_file(&self) -> &ManagedFile {
        &self.advancements_file
    }

    pub fn files(&self) -> [&ManagedFile; 3] {
        [
            &self.player_data_file,
            &self.stats_file,
            &self.advancements_file,
        ]
    }

    fn files_mut(&mut self) -> [&mut ManagedFile; 3] {
        [
            &mut self.player_data_file,
            &mut self.stats_file,
            &mut self.advancements_file,
        ]
    }

    /// Renames every file of the player to `new_uuid`.
    ///
    /// All kinds are attempted even after a failure, and the first error is
    /// returned. On error the files may be split between the old and the new
    /// uuid and `uuid()` still reports the old one.
    pub fn change_uuid(&mut self, new_uuid: Uuid) -> Result<()> {
        debug!(username = %self.username, from = %self.uuid, to = %new_uuid, "changing player uuid");

        let mut first_error = None;
        for file in self.files_mut() {
            if let Err(err) = FileRegistry::rename_managed_file(file, new_uuid) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                self.uuid = new_uuid;
                Ok(())
            }
        }
    }

    /// Deletes every file of the player. No safety check is made here.
    pub fn remove(self) -> Result<()> {
        let mut first_error = None;
        for file in self.files() {
            if let Err(err) = fs::remove_file(file.path()) {
                first_error.get_or_insert(ManagerError::io("remove", file.path(), err));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                info!(username = %self.username, online = self.online, uuid = %self.uuid, "removed player files");
                Ok(())
            }
        }
    }

    /// Display form including every file path.
    pub fn to_extended_string(&self) -> String {
        format!(
            "{self} [player_data_file={}, stats_file={}, advancements_file={}]",
            self.player_data_file.as_posix(),
            self.stats_file.as_posix(),
            self.advancements_file.as_posix(),
        )
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{} - {}", self.username, mode_label(self.online), self.uuid)
    }
}

fn check_kinds(uuid: Uuid, files: &[ManagedFile]) -> Result<()> {
    for kind in FileKind::ALL {
        let count = files.iter().filter(|file| file.kind() == kind).count();
        let reason = match count {
            1 => continue,
            0 => format!("missing {kind} file"),
            n => format!("{n} {kind} files"),
        };
        return Err(ManagerError::InvalidPlayer { uuid, reason });
    }
    Ok(())
}

/// Scans `root` and groups the classified files into players sorted by
/// username. Players sharing a username keep their discovery order.
pub fn generate_players(
    root: &Path,
    registry: &mut FileRegistry,
    identities: &dyn IdentityLookup,
) -> Result<Vec<Player>> {
    debug!("grouping player files by uuid");
    let index = registry.scan(root)?.clone();

    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut buckets: Vec<(Uuid, Vec<ManagedFile>)> = Vec::new();
    for file in index.into_files() {
        let uuid = file.uuid()?;
        let position = *positions.entry(uuid).or_insert_with(|| {
            buckets.push((uuid, Vec::new()));
            buckets.len() - 1
        });
        buckets[position].1.push(file);
    }

    let mut players = buckets
        .into_iter()
        .map(|(uuid, files)| Player::resolve(uuid, files, identities))
        .collect::<Result<Vec<_>>>()?;
    players.sort_by(|a, b| a.username.cmp(&b.username));

    debug!(players = players.len(), "player files grouped");
    Ok(players)
}
