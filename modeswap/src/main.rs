use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use modeswap::properties::parse_bool;
use modeswap::{
    Config, FileRegistry, IdentityTable, ModeStore, ModeSwitchCoordinator, NbtDecoder,
    PlayerDataDecoder, ServerProperties, ServerRoot, ServerRootResolver, generate_players,
    remove_players_safely, whitelist_entries, write_whitelist,
};
use modeswap_db::{Database, PlayerIdentity, mode_label};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "modeswap", version, about = "Keep Minecraft player files consistent across online-mode switches")]
struct Cli {
    /// Minecraft server directory (overrides SERVER_PATH)
    #[arg(long, global = true)]
    server_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the server's online-mode, or switch it and migrate every player
    OnlineMode {
        /// true/false, yes/no, on/off...
        #[arg(value_parser = parse_mode)]
        mode: Option<bool>,
    },
    /// Inspect or reset player files
    Players {
        #[command(subcommand)]
        command: PlayersCommand,
    },
    /// Manage the uuid/username/mode table
    Identities {
        #[command(subcommand)]
        command: IdentitiesCommand,
    },
    /// Write whitelist.json with every identity of the current mode
    Whitelist,
    /// List every classified player file
    DebugFiles,
}

#[derive(Subcommand, Debug)]
enum PlayersCommand {
    /// Every player with its inventory and ender chest item counts
    List,
    /// Files and items of one player
    Show { name: String },
    /// Remove every player whose inventory and ender chest are empty
    Reset {
        /// Remove players holding items too
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum IdentitiesCommand {
    /// Every stored identity
    List,
    /// Store identities from a JSON array of {uuid, username, online}
    Import { file: PathBuf },
}

fn parse_mode(value: &str) -> Result<bool, String> {
    parse_bool(value).ok_or_else(|| format!("{value:?} is not a boolean"))
}

/// Runs synchronous engine work off the async runtime.
async fn blocking<T, F>(work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> modeswap::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work)
        .await
        .context("engine task panicked")??)
}

async fn identity_table(db: &Database) -> anyhow::Result<IdentityTable> {
    let identities = db.all_identities().await?;
    tracing::debug!(identities = identities.len(), "identity table loaded");
    Ok(IdentityTable::new(identities)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(log_level).into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if cli.server_path.is_some() {
        config.server_path = cli.server_path;
    }
    tracing::debug!(
        server_path = ?config.server_path,
        db_path = %config.database_path,
        "configuration loaded"
    );

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("cannot open identity database {}", config.database_path))?;
    let server_path = config.server_path;

    match cli.command {
        Command::OnlineMode { mode: None } => {
            let online = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                ServerProperties::in_root(&root).get_mode()
            })
            .await?;
            println!("online-mode is set to {online}");
        }
        Command::OnlineMode { mode: Some(new_mode) } => {
            let table = identity_table(&db).await?;
            let report = blocking(move || {
                let root = ServerRoot::new(server_path);
                let mut properties = ServerProperties::in_root(&root.root_path()?);
                ModeSwitchCoordinator::new(&table, &mut properties, &root, &NbtDecoder).run(new_mode)
            })
            .await?;

            for player in &report.removed {
                println!("removed {}|{} - {}", player.username, player.mode_label(), player.uuid);
            }
            for player in &report.renamed {
                println!("{}: {} -> {}", player.username, player.old_uuid, player.new_uuid);
            }
            println!("Set online-mode to {}", report.new_mode);
        }
        Command::Players { command } => {
            let table = identity_table(&db).await?;
            players(command, table, server_path).await?;
        }
        Command::Identities {
            command: IdentitiesCommand::List,
        } => {
            for identity in db.all_identities().await? {
                println!("{}\t{}\t{}", identity.username, identity.mode_label(), identity.uuid);
            }
        }
        Command::Identities {
            command: IdentitiesCommand::Import { file },
        } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let identities: Vec<PlayerIdentity> = serde_json::from_str(&contents)
                .with_context(|| format!("invalid identities file {}", file.display()))?;
            let stored = db.import_identities(identities).await?;
            println!("imported {} identities", stored.len());
        }
        Command::Whitelist => {
            let table = identity_table(&db).await?;
            let (path, count) = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                let online = ServerProperties::in_root(&root).get_mode()?;
                let entries = whitelist_entries(&table, online);
                Ok((write_whitelist(&root, &entries)?, entries.len()))
            })
            .await?;
            println!("wrote {count} entries to {}", path.display());
        }
        Command::DebugFiles => {
            let files = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                let mut registry = FileRegistry::default();
                Ok(registry.scan(&root)?.clone())
            })
            .await?;
            for file in files.iter() {
                println!("{}\t{}", file.kind(), file.as_posix());
            }
        }
    }

    Ok(())
}

async fn players(
    command: PlayersCommand,
    table: IdentityTable,
    server_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    match command {
        PlayersCommand::List => {
            let lines = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                let players = generate_players(&root, &mut FileRegistry::default(), &table)?;
                Ok(players
                    .iter()
                    .map(|player| {
                        let contents = match NbtDecoder.contents_of(player) {
                            Ok((inventory, ender_chest)) => format!(
                                "inventory={} ender_chest={}",
                                inventory.len(),
                                ender_chest.len()
                            ),
                            Err(err) => format!("unreadable: {err}"),
                        };
                        format!(
                            "{}\t{}\t{}\t{contents}",
                            player.username(),
                            mode_label(player.online()),
                            player.uuid()
                        )
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
            for line in lines {
                println!("{line}");
            }
        }
        PlayersCommand::Show { name } => {
            let lines = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                let players = generate_players(&root, &mut FileRegistry::default(), &table)?;
                let mut lines = Vec::new();
                for player in players.iter().filter(|player| player.username() == name) {
                    lines.push(player.to_extended_string());
                    let (inventory, ender_chest) = NbtDecoder.contents_of(player)?;
                    for (label, items) in [("inventory", inventory), ("ender_chest", ender_chest)] {
                        for item in items {
                            lines.push(format!(
                                "  {label} slot={} {} x{}",
                                item.slot.map_or("-".to_string(), |slot| slot.to_string()),
                                item.id,
                                item.count.unwrap_or(1)
                            ));
                        }
                    }
                }
                Ok(lines)
            })
            .await?;
            if lines.is_empty() {
                bail!("no player files found for that username");
            }
            for line in lines {
                println!("{line}");
            }
        }
        PlayersCommand::Reset { force } => {
            let report = blocking(move || {
                let root = ServerRoot::new(server_path).root_path()?;
                let players = generate_players(&root, &mut FileRegistry::default(), &table)?;
                remove_players_safely(players, &NbtDecoder, force)
            })
            .await?;

            for player in &report.removed {
                println!("removed {}|{} - {}", player.username, player.mode_label(), player.uuid);
            }
            if report.has_blocked() {
                let blocked: Vec<String> = report
                    .blocked
                    .iter()
                    .map(|blocked| blocked.player.to_string())
                    .collect();
                bail!("players holding items were kept: {}", blocked.join(", "));
            }
        }
    }
    Ok(())
}
