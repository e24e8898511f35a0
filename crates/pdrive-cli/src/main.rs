//! pdrive: local metadata cache of the drive client
//!
//! Commands:
//!   config show                              - display current configuration
//!   share-state [--watch]                    - classify the photos share from cached shares
//!   user check|store --user-id <id>          - compare or record the account using this device
//!   move --parent <id> --volume <id> --node <id>.. --infos <file>
//!                                            - apply a confirmed move to the cache
//!   album upsert --link <file>               - fold remote album links into the cache
//!   digest --volume <id> --node <id>         - show the content identity of a cached photo or file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use pdrive_cache::{
    AlbumsUpdater, CacheContext, MovedNodesUpdateRepository, NodeCryptoMaterialReader,
    PhotosShareStateObserver,
};
use pdrive_core::config::{DriveConfig, UnconfirmedNodePolicy};
use pdrive_core::{Link, MovedLinkInfo, NodeIdentifier};
use pdrive_crypto::{content_hash_for_move, ClearXAttrDecryptor};
use pdrive_secrets::{
    stored_hash_repository, PreviouslyLoggedInUser, PreviouslyLoggedInUserRepository,
    SessionUserHashRepository,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pdrive",
    version,
    about = "pdrive local cache client",
    long_about = "pdrive: inspect and reconcile the local metadata cache of the drive client"
)]
struct Cli {
    /// Path to pdrive.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "PDRIVE_CONFIG",
        default_value = "~/.config/pdrive/pdrive.toml"
    )]
    config: PathBuf,

    /// Cache location (overrides [cache] path)
    #[arg(long, env = "PDRIVE_CACHE")]
    cache: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to [logging] level
    #[arg(long, env = "PDRIVE_LOG")]
    log: Option<String>,

    /// Log format (json, text); defaults to [logging] format
    #[arg(long, env = "PDRIVE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show which photo backend the cached shares point to
    #[command(name = "share-state")]
    ShareState {
        /// Keep running and print every change
        #[arg(long)]
        watch: bool,
    },

    /// Account continuity on this device
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Apply a move the server confirmed to the local cache
    Move {
        /// New parent folder link ID
        #[arg(long)]
        parent: String,
        /// Volume of the parent and the moved nodes
        #[arg(long)]
        volume: String,
        /// Moved node link IDs, in request order
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,
        /// JSON array of confirmed link infos
        #[arg(long)]
        infos: PathBuf,
        /// What to do with nodes missing from the infos (overrides [moves])
        #[arg(long)]
        unconfirmed: Option<Policy>,
    },

    /// Album management
    Album {
        #[command(subcommand)]
        action: AlbumAction,
    },

    /// Show the content identity of a cached node
    Digest {
        #[arg(long)]
        volume: String,
        #[arg(long)]
        node: String,
        /// Also derive the content hash a move under this parent hash key would carry
        #[arg(long)]
        new_parent_hash_key: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Compare the current account with the last one recorded on this device
    Check {
        #[arg(long, env = "PDRIVE_USER_ID")]
        user_id: Option<String>,
        /// Wipe the cache unless the same account used it last
        #[arg(long)]
        wipe: bool,
    },
    /// Record the current account as the last one on this device
    Store {
        #[arg(long, env = "PDRIVE_USER_ID")]
        user_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AlbumAction {
    /// Create or update albums from a JSON file with one link or an array of links
    Upsert {
        #[arg(long)]
        link: PathBuf,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Skip,
    Reparent,
}

impl From<Policy> for UnconfirmedNodePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Skip => UnconfirmedNodePolicy::Skip,
            Policy::Reparent => UnconfirmedNodePolicy::Reparent,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = pdrive_core::config::expand_home(&cli.config);
    let mut config = DriveConfig::from_file(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    if let Some(cache) = &cli.cache {
        config.cache.path = cache.clone();
    }

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None if config.logging.format.eq_ignore_ascii_case("json") => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        cache = %config.cache.path.display(),
        "pdrive starting"
    );

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
        Commands::ShareState { watch } => cmd_share_state(&config, watch).await,
        Commands::User {
            action: UserAction::Check { user_id, wipe },
        } => cmd_user_check(&config, user_id, wipe).await,
        Commands::User {
            action: UserAction::Store { user_id },
        } => cmd_user_store(&config, user_id),
        Commands::Move {
            parent,
            volume,
            nodes,
            infos,
            unconfirmed,
        } => {
            let policy = unconfirmed
                .map(UnconfirmedNodePolicy::from)
                .unwrap_or(config.moves.unconfirmed_nodes);
            cmd_move(&config, &parent, &volume, &nodes, &infos, policy).await
        }
        Commands::Album {
            action: AlbumAction::Upsert { link },
        } => cmd_album_upsert(&config, &link).await,
        Commands::Digest {
            volume,
            node,
            new_parent_hash_key,
        } => cmd_digest(&config, &volume, &node, new_parent_hash_key.as_deref()).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // logs go to stderr, command output to stdout
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_cache(config: &DriveConfig) -> Result<CacheContext> {
    CacheContext::open(&config.cache)
        .with_context(|| format!("opening cache: {}", config.cache.path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

// ── `pdrive config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &DriveConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── `pdrive share-state` ──────────────────────────────────────────────────────

async fn cmd_share_state(config: &DriveConfig, watch: bool) -> Result<()> {
    let context = open_cache(config)?;
    let observer = PhotosShareStateObserver::new(context).await;
    let mut states = observer.state(&tokio::runtime::Handle::current());

    if !watch {
        let state = states
            .next()
            .await
            .context("share state stream ended before the first state")?;
        println!("{state}");
        return Ok(());
    }

    loop {
        tokio::select! {
            state = states.next() => match state {
                Some(state) => println!("{state}"),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping share state watch");
                return Ok(());
            }
        }
    }
}

// ── `pdrive user` ─────────────────────────────────────────────────────────────

fn user_repository(
    config: &DriveConfig,
    user_id: Option<String>,
) -> PreviouslyLoggedInUserRepository {
    PreviouslyLoggedInUserRepository::new(
        Box::new(SessionUserHashRepository::new(user_id)),
        stored_hash_repository(&config.session),
    )
}

async fn cmd_user_check(config: &DriveConfig, user_id: Option<String>, wipe: bool) -> Result<()> {
    let previous = user_repository(config, user_id)
        .get_previous_user()
        .context("checking previously logged in user")?;
    let label = match previous {
        PreviouslyLoggedInUser::SameUser => "same_user",
        PreviouslyLoggedInUser::DifferentUser => "different_user",
        PreviouslyLoggedInUser::MissingInfo => "missing_info",
    };
    println!("{label}");

    if wipe && previous.requires_cache_reset() {
        warn!(previous = label, "cache belongs to another account, wiping");
        let context = open_cache(config)?;
        context
            .perform(|store| store.wipe())
            .await
            .context("wiping cache")?;
        println!("cache wiped");
    }
    Ok(())
}

fn cmd_user_store(config: &DriveConfig, user_id: Option<String>) -> Result<()> {
    user_repository(config, user_id)
        .store_current_user()
        .context("storing current user fingerprint")?;
    println!("current user recorded");
    Ok(())
}

// ── `pdrive move` ─────────────────────────────────────────────────────────────

async fn cmd_move(
    config: &DriveConfig,
    parent: &str,
    volume: &str,
    nodes: &[String],
    infos_path: &Path,
    policy: UnconfirmedNodePolicy,
) -> Result<()> {
    let infos: Vec<MovedLinkInfo> = read_json(infos_path)?;
    let new_parent = NodeIdentifier::new(parent, volume);
    let nodes: Vec<NodeIdentifier> = nodes
        .iter()
        .map(|node| NodeIdentifier::new(node.as_str(), volume))
        .collect();

    let repository = MovedNodesUpdateRepository::new(open_cache(config)?).with_policy(policy);
    repository
        .update_local_db(&new_parent, &nodes, &infos)
        .await
        .with_context(|| format!("moving {} nodes under {new_parent}", nodes.len()))?;

    let confirmed = nodes
        .iter()
        .filter(|node| infos.iter().any(|info| info.link.link_id == node.id))
        .count();
    println!("Move applied:");
    println!("  parent:      {new_parent}");
    println!("  confirmed:   {confirmed}");
    println!("  unconfirmed: {} ({policy:?})", nodes.len() - confirmed);
    Ok(())
}

// ── `pdrive album upsert` ─────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Link>),
    One(Box<Link>),
}

async fn cmd_album_upsert(config: &DriveConfig, path: &Path) -> Result<()> {
    let links = match read_json::<OneOrMany>(path)? {
        OneOrMany::Many(links) => links,
        OneOrMany::One(link) => vec![*link],
    };

    let updater = AlbumsUpdater::new(open_cache(config)?);
    let albums = updater
        .update_albums(&links)
        .await
        .context("updating albums")?;

    for album in &albums {
        println!("Album {}:", album.identifier);
        println!("  photos:  {}", album.photos.len());
        match &album.cover_photo {
            Some(cover) => println!("  cover:   {cover}"),
            None => println!("  cover:   none"),
        }
    }
    Ok(())
}

// ── `pdrive digest` ───────────────────────────────────────────────────────────

async fn cmd_digest(
    config: &DriveConfig,
    volume: &str,
    node: &str,
    new_parent_hash_key: Option<&str>,
) -> Result<()> {
    let identifier = NodeIdentifier::new(node, volume);
    let context = open_cache(config)?;
    let revision = context
        .perform(|store| {
            store
                .node(&identifier)
                .and_then(|node| node.current_revision().cloned())
        })
        .await
        .with_context(|| format!("no cached revision for node {identifier}"))?;

    // cached extended attributes are stored decrypted
    let decryptor = ClearXAttrDecryptor;
    let digest = revision
        .content_digest(&decryptor)
        .with_context(|| format!("resolving content digest of {identifier}"))?;
    println!("{digest}");

    if let Some(key) = new_parent_hash_key {
        if let Some(hash) = content_hash_for_move(Some(&digest), key)? {
            println!("content hash for move: {hash}");
        }
    }

    // material a move of this node would need; missing parent or name is not fatal here
    let reader = NodeCryptoMaterialReader::new(context, Arc::new(decryptor));
    match reader.read_node(&identifier).await {
        Ok(material) => println!(
            "old parent: {} (anonymous: {})",
            material.old_parent, material.is_anonymous
        ),
        Err(e) => warn!(node = %identifier, error = %e, "node cannot be moved as cached"),
    }
    Ok(())
}
