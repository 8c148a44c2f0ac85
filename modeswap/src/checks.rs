//! Consistency checks run over the discovered players before any rename.

use std::collections::BTreeMap;

use modeswap_db::{PlayerIdentity, mode_label};
use tracing::{debug, error, info, warn};

use crate::error::{CheckFailure, Result};
use crate::nbt::PlayerDataDecoder;
use crate::player::Player;
use crate::removal::{RemovalReport, remove_players_safely};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Nothing to fix.
    Passed,
    /// Offending players were found and all of them were removed safely.
    PassedAfterRemediation,
}

/// Result of a passing check: the players still on disk and the ones removed
/// to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub players: Vec<Player>,
    pub removed: Vec<PlayerIdentity>,
    pub outcome: CheckOutcome,
}

impl CheckReport {
    fn passed(players: Vec<Player>) -> Self {
        Self {
            players,
            removed: Vec::new(),
            outcome: CheckOutcome::Passed,
        }
    }

    fn remediated(players: Vec<Player>, removal: RemovalReport) -> Self {
        Self {
            players,
            removed: removal.removed,
            outcome: CheckOutcome::PassedAfterRemediation,
        }
    }

    fn then(mut self, next: CheckReport) -> Self {
        self.removed.extend(next.removed);
        self.players = next.players;
        if next.outcome == CheckOutcome::PassedAfterRemediation {
            self.outcome = CheckOutcome::PassedAfterRemediation;
        }
        self
    }
}

/// Runs the online-mode check and then the duplicates check.
pub fn check_players(
    players: Vec<Player>,
    server_mode: bool,
    decoder: &dyn PlayerDataDecoder,
) -> Result<CheckReport> {
    debug!(players = players.len(), server_mode, "checking players");

    let online = check_online_mode(players, server_mode, decoder).inspect_err(|_| {
        error!("online mode check failed");
    })?;
    let duplicates = check_duplicates(online.players.clone(), decoder).inspect_err(|_| {
        error!("duplicates check failed");
    })?;
    let report = online.then(duplicates);

    debug!(outcome = ?report.outcome, removed = report.removed.len(), "player checks passed");
    Ok(report)
}

/// Every player must use the same online-mode as the server. Offenders are
/// removed if they hold no items; the check fails if any of them cannot be.
pub fn check_online_mode(
    players: Vec<Player>,
    server_mode: bool,
    decoder: &dyn PlayerDataDecoder,
) -> Result<CheckReport> {
    let (valid, offenders): (Vec<Player>, Vec<Player>) = players
        .into_iter()
        .partition(|player| player.online() == server_mode);

    if offenders.is_empty() {
        return Ok(CheckReport::passed(valid));
    }

    error!(
        server_mode = mode_label(server_mode),
        count = offenders.len(),
        players = %join(&offenders),
        "players are using a different mode than the server"
    );

    let removal = remove_players_safely(offenders, decoder, false)?;
    if removal.has_blocked() {
        return Err(CheckFailure::OnlineMode {
            blocked: blocked_names(&removal),
        }
        .into());
    }

    info!(removed = removal.removed.len(), "online mode mismatches removed");
    Ok(CheckReport::remediated(valid, removal))
}

/// A username may own only one player record. Every player of a repeated
/// username is an offender and goes through safe removal.
pub fn check_duplicates(players: Vec<Player>, decoder: &dyn PlayerDataDecoder) -> Result<CheckReport> {
    let duplicates: BTreeMap<String, usize> = group_players(&players)
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(username, group)| (username.to_string(), group.len()))
        .collect();

    if duplicates.is_empty() {
        return Ok(CheckReport::passed(players));
    }

    error!(?duplicates, "these usernames have more than one player record");

    let (offenders, valid): (Vec<Player>, Vec<Player>) = players
        .into_iter()
        .partition(|player| duplicates.contains_key(player.username()));
    warn!(
        count = offenders.len(),
        players = %join(&offenders),
        "removing every record of the duplicated usernames"
    );

    let removal = remove_players_safely(offenders, decoder, false)?;
    if removal.has_blocked() {
        return Err(CheckFailure::Duplicates {
            blocked: blocked_names(&removal),
        }
        .into());
    }

    info!(removed = removal.removed.len(), "duplicated players removed");
    Ok(CheckReport::remediated(valid, removal))
}

/// Groups players by username, usernames in order.
pub fn group_players(players: &[Player]) -> Vec<(&str, Vec<&Player>)> {
    let mut groups: BTreeMap<&str, Vec<&Player>> = BTreeMap::new();
    for player in players {
        groups.entry(player.username()).or_default().push(player);
    }
    groups.into_iter().collect()
}

fn join(players: &[Player]) -> String {
    players
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn blocked_names(removal: &RemovalReport) -> Vec<String> {
    removal
        .blocked
        .iter()
        .map(|blocked| {
            format!(
                "{} (inventory={}, ender_chest={})",
                blocked.player, blocked.inventory, blocked.ender_chest
            )
        })
        .collect()
}
