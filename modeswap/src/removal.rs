//! Deleting players whose saves hold nothing worth keeping.

use modeswap_db::PlayerIdentity;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::nbt::PlayerDataDecoder;
use crate::player::Player;

/// A player left in place because its inventory or ender chest has items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedPlayer {
    pub player: Player,
    pub inventory: usize,
    pub ender_chest: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Players whose files were deleted, forced ones included.
    pub removed: Vec<PlayerIdentity>,
    /// Players deleted despite holding items (forced mode only).
    pub forced: Vec<PlayerIdentity>,
    /// Players that could not be removed safely (non-forced mode only).
    pub blocked: Vec<BlockedPlayer>,
}

impl RemovalReport {
    /// Whether any player could not be removed.
    pub fn has_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }
}

/// Removes every player whose inventory and ender chest are both empty.
///
/// Without `force`, a player holding items is kept and reported as blocked,
/// and the batch carries on with the next player. With `force` it is removed
/// anyway after a warning.
pub fn remove_players_safely(
    players: Vec<Player>,
    decoder: &dyn PlayerDataDecoder,
    force: bool,
) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();

    for player in players {
        debug!(player = %player, force, "analysing player");

        let (inventory, ender_chest) = match decoder.contents_of(&player) {
            Ok((inventory, ender_chest)) => (inventory.len(), ender_chest.len()),
            Err(err) if force => {
                warn!(player = %player, error = %err, "unreadable player data, removing anyway (forced)");
                let identity = player.identity();
                player.remove()?;
                report.forced.push(identity);
                report.removed.push(identity);
                continue;
            }
            Err(err) => return Err(err),
        };

        let identity = player.identity();
        if inventory > 0 || ender_chest > 0 {
            if !force {
                error!(
                    player = %player.to_extended_string(),
                    inventory,
                    ender_chest,
                    "can't remove player holding items"
                );
                report.blocked.push(BlockedPlayer {
                    player,
                    inventory,
                    ender_chest,
                });
                continue;
            }

            warn!(player = %player, inventory, ender_chest, "removing player holding items (forced)");
            report.forced.push(identity);
        }

        player.remove()?;
        report.removed.push(identity);
    }

    if report.has_blocked() {
        warn!(
            removed = report.removed.len(),
            blocked = report.blocked.len(),
            "some players could not be removed safely"
        );
    } else {
        info!(removed = report.removed.len(), forced = report.forced.len(), "players removed");
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ManagerError;
    use crate::files::{FileKind, ManagedFile};
    use crate::nbt::Item;
    use modeswap_db::PlayerName;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use uuid::Uuid;

    /// Decoder double: item counts per uuid, unknown uuids fail to decode.
    #[derive(Debug, Default)]
    pub(crate) struct FakeDecoder {
        pub contents: HashMap<Uuid, (usize, usize)>,
    }

    impl FakeDecoder {
        pub(crate) fn with(mut self, uuid: Uuid, inventory: usize, ender_chest: usize) -> Self {
            self.contents.insert(uuid, (inventory, ender_chest));
            self
        }

        fn items(count: usize) -> Vec<Item> {
            (0..count)
                .map(|slot| Item {
                    id: "minecraft:stone".to_string(),
                    slot: Some(slot as i8),
                    count: Some(1),
                })
                .collect()
        }

        fn lookup(&self, player: &Player) -> Result<(usize, usize)> {
            self.contents
                .get(&player.uuid())
                .copied()
                .ok_or_else(|| ManagerError::PlayerData {
                    path: player.player_data_file().path().to_path_buf(),
                    reason: "no fixture".to_string(),
                })
        }
    }

    impl PlayerDataDecoder for FakeDecoder {
        fn inventory_of(&self, player: &Player) -> Result<Vec<Item>> {
            Ok(Self::items(self.lookup(player)?.0))
        }

        fn ender_chest_of(&self, player: &Player) -> Result<Vec<Item>> {
            Ok(Self::items(self.lookup(player)?.1))
        }
    }

    /// Writes a full file triple under `root` and returns the player.
    pub(crate) fn player_on_disk(root: &Path, uuid: &str, name: &str, online: bool) -> Player {
        let files = [
            (FileKind::PlayerData, format!("world/playerdata/{uuid}.dat")),
            (FileKind::Stats, format!("world/stats/{uuid}.json")),
            (FileKind::Advancements, format!("world/advancements/{uuid}.json")),
        ]
        .into_iter()
        .map(|(kind, relative)| {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"{}").unwrap();
            ManagedFile::new(kind, path)
        })
        .collect();

        let identity = PlayerIdentity::new(
            Uuid::parse_str(uuid).unwrap(),
            PlayerName::try_from(name).unwrap(),
            online,
        );
        Player::new(identity, files).unwrap()
    }

    fn all_exist(player: &Player) -> bool {
        player.files().iter().all(|file| file.path().is_file())
    }

    const EMPTY: &str = "75565eb8-3a61-4e77-be18-802cbad0ff03";
    const FULL: &str = "308fcd27-49a8-4795-a6a0-568eef0ca964";

    #[test]
    fn test_empty_player_removed_in_both_modes() {
        for force in [false, true] {
            let dir = tempfile::tempdir().unwrap();
            let player = player_on_disk(dir.path(), EMPTY, "Galesaiz_98", false);
            let files: Vec<_> = player.files().iter().map(|f| f.path().to_path_buf()).collect();
            let decoder = FakeDecoder::default().with(player.uuid(), 0, 0);

            let report = remove_players_safely(vec![player], &decoder, force).unwrap();

            assert_eq!(report.removed.len(), 1);
            assert!(report.forced.is_empty());
            assert!(!report.has_blocked());
            assert!(files.iter().all(|path| !path.exists()));
        }
    }

    #[test]
    fn test_player_with_items_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let full = player_on_disk(dir.path(), FULL, "Axeh99", false);
        let empty = player_on_disk(dir.path(), EMPTY, "Galesaiz_98", false);
        let decoder = FakeDecoder::default()
            .with(full.uuid(), 3, 0)
            .with(empty.uuid(), 0, 0);

        // The blocked player comes first: the batch must not stop there
        let report = remove_players_safely(vec![full.clone(), empty.clone()], &decoder, false).unwrap();

        assert!(report.has_blocked());
        assert_eq!(report.blocked.len(), 1);
        assert_eq!(report.blocked[0].player, full);
        assert_eq!(report.blocked[0].inventory, 3);
        assert!(all_exist(&full));
        assert_eq!(report.removed, vec![empty.identity()]);
        assert!(!all_exist(&empty));
    }

    #[test]
    fn test_ender_chest_alone_blocks_removal() {
        let dir = tempfile::tempdir().unwrap();
        let player = player_on_disk(dir.path(), FULL, "Axeh99", true);
        let decoder = FakeDecoder::default().with(player.uuid(), 0, 2);

        let report = remove_players_safely(vec![player.clone()], &decoder, false).unwrap();
        assert_eq!(report.blocked[0].ender_chest, 2);
        assert!(all_exist(&player));
    }

    #[test]
    fn test_player_with_items_removed_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let player = player_on_disk(dir.path(), FULL, "Axeh99", false);
        let decoder = FakeDecoder::default().with(player.uuid(), 5, 7);

        let report = remove_players_safely(vec![player.clone()], &decoder, true).unwrap();

        assert!(!report.has_blocked());
        assert_eq!(report.forced, vec![player.identity()]);
        assert_eq!(report.removed, vec![player.identity()]);
        assert!(player.files().iter().all(|file| !file.path().exists()));
    }

    #[test]
    fn test_unreadable_data_fails_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let player = player_on_disk(dir.path(), FULL, "Axeh99", false);
        let decoder = FakeDecoder::default();

        let result = remove_players_safely(vec![player.clone()], &decoder, false);
        assert!(matches!(result, Err(ManagerError::PlayerData { .. })));
        assert!(all_exist(&player));

        let report = remove_players_safely(vec![player.clone()], &decoder, true).unwrap();
        assert_eq!(report.forced, vec![player.identity()]);
        assert!(!all_exist(&player));
    }
}
