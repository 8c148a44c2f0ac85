use std::collections::HashMap;

use modeswap_db::{PlayerIdentity, PlayerName, mode_label};
use uuid::Uuid;

use crate::error::{ManagerError, Result, SearchError};

/// Who a uuid belongs to, and which uuid a username has in each mode.
pub trait IdentityLookup {
    fn username_of(&self, uuid: Uuid) -> std::result::Result<PlayerName, SearchError>;

    fn mode_of(&self, uuid: Uuid) -> std::result::Result<bool, SearchError>;

    fn uuid_of(&self, username: &str, online: bool) -> std::result::Result<Uuid, SearchError>;
}

/// In-memory snapshot of the identity table, taken once per run.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    by_uuid: HashMap<Uuid, PlayerIdentity>,
    by_name: HashMap<(PlayerName, bool), Uuid>,
}

impl IdentityTable {
    /// Builds the table, rejecting a uuid listed twice or a username with two
    /// identities in the same mode.
    pub fn new(identities: impl IntoIterator<Item = PlayerIdentity>) -> Result<Self> {
        let mut table = Self::default();
        for identity in identities {
            if table.by_uuid.contains_key(&identity.uuid)
                || table
                    .by_name
                    .contains_key(&(identity.username, identity.online))
            {
                return Err(ManagerError::DuplicateIdentity {
                    username: identity.username.to_string(),
                    mode: identity.mode_label(),
                });
            }
            table
                .by_name
                .insert((identity.username, identity.online), identity.uuid);
            table.by_uuid.insert(identity.uuid, identity);
        }
        Ok(table)
    }

    pub fn get(&self, uuid: Uuid) -> Option<&PlayerIdentity> {
        self.by_uuid.get(&uuid)
    }

    /// Identities sorted by username, offline before online.
    pub fn identities(&self) -> Vec<PlayerIdentity> {
        let mut identities: Vec<_> = self.by_uuid.values().copied().collect();
        identities.sort_by(|a, b| (a.username, a.online).cmp(&(b.username, b.online)));
        identities
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

impl IdentityLookup for IdentityTable {
    fn username_of(&self, uuid: Uuid) -> std::result::Result<PlayerName, SearchError> {
        self.get(uuid)
            .map(|identity| identity.username)
            .ok_or(SearchError::Uuid(uuid))
    }

    fn mode_of(&self, uuid: Uuid) -> std::result::Result<bool, SearchError> {
        self.get(uuid)
            .map(|identity| identity.online)
            .ok_or(SearchError::Uuid(uuid))
    }

    fn uuid_of(&self, username: &str, online: bool) -> std::result::Result<Uuid, SearchError> {
        let missing = || SearchError::Username {
            username: username.to_string(),
            mode: mode_label(online),
        };
        let name = PlayerName::try_from(username).map_err(|_| missing())?;
        self.by_name.get(&(name, online)).copied().ok_or_else(missing)
    }
}
