//! Switching the server between online and offline mode.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use modeswap_db::{PlayerIdentity, mode_label};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::checks::check_players;
use crate::config::ServerRootResolver;
use crate::error::{ManagerError, Result};
use crate::identity::IdentityLookup;
use crate::nbt::PlayerDataDecoder;
use crate::player::{Player, generate_players};
use crate::properties::ModeStore;
use crate::registry::{FileRegistry, renamed_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    Validating,
    Checking,
    Mutating,
    Persisted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedPlayer {
    pub username: String,
    pub old_uuid: Uuid,
    pub new_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub previous_mode: bool,
    pub new_mode: bool,
    pub renamed: Vec<RenamedPlayer>,
    /// Players deleted by the consistency checks before renaming.
    pub removed: Vec<PlayerIdentity>,
}

/// Runs a mode switch: validate, check, rename every player, persist.
///
/// Renames are not rolled back. A failure after the first rename leaves the
/// server split between both uuid sets and is reported as
/// [`ManagerError::PartialMigration`].
pub struct ModeSwitchCoordinator<'a> {
    identities: &'a dyn IdentityLookup,
    modes: &'a mut dyn ModeStore,
    root: &'a dyn ServerRootResolver,
    decoder: &'a dyn PlayerDataDecoder,
    registry: FileRegistry,
    state: SwitchState,
}

impl<'a> ModeSwitchCoordinator<'a> {
    pub fn new(
        identities: &'a dyn IdentityLookup,
        modes: &'a mut dyn ModeStore,
        root: &'a dyn ServerRootResolver,
        decoder: &'a dyn PlayerDataDecoder,
    ) -> Self {
        Self {
            identities,
            modes,
            root,
            decoder,
            registry: FileRegistry::default(),
            state: SwitchState::Idle,
        }
    }

    pub fn with_registry(mut self, registry: FileRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn run(&mut self, new_mode: bool) -> Result<SwitchReport> {
        match self.execute(new_mode) {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(error = %err, state = ?self.state, "mode switch failed");
                self.transition(SwitchState::Failed);
                Err(err)
            }
        }
    }

    fn transition(&mut self, state: SwitchState) {
        debug!(from = ?self.state, to = ?state, "switch state");
        self.state = state;
    }

    fn execute(&mut self, new_mode: bool) -> Result<SwitchReport> {
        self.transition(SwitchState::Validating);
        let previous_mode = self.modes.get_mode()?;
        if previous_mode == new_mode {
            return Err(ManagerError::AlreadySet(previous_mode));
        }
        info!(
            from = mode_label(previous_mode),
            to = mode_label(new_mode),
            "switching online mode"
        );

        let root = self.root.root_path()?;
        let players = generate_players(&root, &mut self.registry, self.identities)?;

        self.transition(SwitchState::Checking);
        let checked = check_players(players, previous_mode, self.decoder)?;
        let removed = checked.removed;
        let plan = self.plan(checked.players, new_mode)?;

        self.transition(SwitchState::Mutating);
        let renamed = migrate(plan)?;

        self.modes.set_mode(new_mode)?;
        self.transition(SwitchState::Persisted);
        info!(renamed = renamed.len(), removed = removed.len(), "online mode switched");

        Ok(SwitchReport {
            previous_mode,
            new_mode,
            renamed,
            removed,
        })
    }

    /// Resolves every target uuid and checks every target path before
    /// anything is renamed.
    fn plan(&self, players: Vec<Player>, new_mode: bool) -> Result<Vec<(Player, Uuid)>> {
        let mut targets: HashSet<PathBuf> = HashSet::new();
        let mut plan = Vec::with_capacity(players.len());

        for player in players {
            if player.online() == new_mode {
                return Err(ManagerError::StateViolation {
                    username: player.username().to_string(),
                    uuid: player.uuid(),
                    online: new_mode,
                });
            }

            let new_uuid = self.identities.uuid_of(player.username(), new_mode)?;
            for file in player.files() {
                let target = renamed_path(file.path(), new_uuid);
                if fs::symlink_metadata(&target).is_ok() || !targets.insert(target.clone()) {
                    return Err(ManagerError::io(
                        "rename onto existing",
                        target,
                        io::Error::from(io::ErrorKind::AlreadyExists),
                    ));
                }
            }

            debug!(player = %player, %new_uuid, "planned rename");
            plan.push((player, new_uuid));
        }

        Ok(plan)
    }
}

fn migrate(plan: Vec<(Player, Uuid)>) -> Result<Vec<RenamedPlayer>> {
    let mut renamed = Vec::with_capacity(plan.len());

    for (mut player, new_uuid) in plan {
        let old_uuid = player.uuid();
        player
            .change_uuid(new_uuid)
            .map_err(|source| ManagerError::PartialMigration {
                username: player.username().to_string(),
                migrated: renamed.len(),
                source: Box::new(source),
            })?;

        info!(username = %player.username(), %old_uuid, %new_uuid, "player migrated");
        renamed.push(RenamedPlayer {
            username: player.username().to_string(),
            old_uuid,
            new_uuid,
        });
    }

    Ok(renamed)
}
