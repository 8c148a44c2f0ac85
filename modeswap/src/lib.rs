pub mod checks;
pub mod config;
mod error;
pub mod files;
pub mod identity;
pub mod nbt;
pub mod player;
pub mod properties;
pub mod registry;
pub mod removal;
pub mod switch;
pub mod whitelist;

pub use checks::{CheckOutcome, CheckReport, check_players};
pub use config::{Config, ServerRoot, ServerRootResolver};
pub use error::{CheckFailure, ManagerError, Result, SearchError};
pub use files::{FileKind, KindRegistry, ManagedFile};
pub use identity::{IdentityLookup, IdentityTable};
pub use nbt::{Item, NbtDecoder, PlayerDataDecoder};
pub use player::{Player, generate_players};
pub use properties::{ModeStore, ServerProperties};
pub use registry::{FileIndex, FileRegistry};
pub use removal::{RemovalReport, remove_players_safely};
pub use switch::{ModeSwitchCoordinator, RenamedPlayer, SwitchReport, SwitchState};
pub use whitelist::{WhitelistEntry, whitelist_entries, write_whitelist};
