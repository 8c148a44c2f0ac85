//! Inventory and ender chest contents read from a player's `.dat` file.

use std::fs;
use std::io::Read;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::error::{ManagerError, Result};
use crate::player::Player;

/// One item stack. Only what is needed to tell an empty slot list from a
/// non-empty one, and to show it to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "Slot", default)]
    pub slot: Option<i8>,
    /// `Count` (byte) before 1.20.5, `count` (int) after.
    #[serde(alias = "Count", default)]
    pub count: Option<i32>,
}

/// Reads a player's saved inventory and ender chest.
pub trait PlayerDataDecoder {
    fn inventory_of(&self, player: &Player) -> Result<Vec<Item>>;

    fn ender_chest_of(&self, player: &Player) -> Result<Vec<Item>>;

    /// Both lists at once: (inventory, ender chest).
    fn contents_of(&self, player: &Player) -> Result<(Vec<Item>, Vec<Item>)> {
        Ok((self.inventory_of(player)?, self.ender_chest_of(player)?))
    }
}

#[derive(Debug, Deserialize)]
struct PlayerDat {
    #[serde(rename = "Inventory", default)]
    inventory: Vec<Item>,
    #[serde(rename = "EnderItems", default)]
    ender_items: Vec<Item>,
}

/// Decoder for the gzip-compressed NBT files under `playerdata/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NbtDecoder;

impl NbtDecoder {
    fn decode(&self, player: &Player) -> Result<PlayerDat> {
        let path = player.player_data_file().path();
        let invalid = |reason: String| ManagerError::PlayerData {
            path: path.to_path_buf(),
            reason,
        };

        let compressed = fs::read(path).map_err(|err| ManagerError::io("read", path, err))?;
        let mut raw = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|err| invalid(format!("gzip: {err}")))?;

        fastnbt::from_bytes(&raw).map_err(|err| invalid(format!("nbt: {err}")))
    }
}

impl PlayerDataDecoder for NbtDecoder {
    fn inventory_of(&self, player: &Player) -> Result<Vec<Item>> {
        Ok(self.decode(player)?.inventory)
    }

    fn ender_chest_of(&self, player: &Player) -> Result<Vec<Item>> {
        Ok(self.decode(player)?.ender_items)
    }

    fn contents_of(&self, player: &Player) -> Result<(Vec<Item>, Vec<Item>)> {
        let data = self.decode(player)?;
        Ok((data.inventory, data.ender_items))
    }
}
