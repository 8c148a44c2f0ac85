use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// One row of the identity table: which username and authentication mode a
/// uuid belongs to.
///
/// The same username appears at most twice, once per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
  /// Player uuid as used in the server's file names
  pub uuid: Uuid,
  /// Player's Minecraft username
  pub username: PlayerName,
  /// `true` for online-mode (account service) uuids, `false` for offline ones
  pub online: bool,
}

impl PlayerIdentity {
  pub fn new(uuid: Uuid, username: PlayerName, online: bool) -> Self {
    Self {
      uuid,
      username,
      online,
    }
  }

  /// "online" or "offline"
  pub fn mode_label(&self) -> &'static str {
    mode_label(self.online)
  }
}

/// Human readable name of an online-mode flag.
pub fn mode_label(online: bool) -> &'static str {
  if online { "online" } else { "offline" }
}
