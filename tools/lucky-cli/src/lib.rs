//! Operator commands: schema setup, document-to-relational sync and a
//! supervised server start.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lucky_api_server::config::{Config, DEFAULT_DATABASE_URL};
use lucky_common::{Collection, Env};
use lucky_reward_distributor::execute::seed_default_settings;
use lucky_store::{sync_all, sync_collection, DocumentStore, SqlStore, SyncReport};
use tracing::{error, info};

pub const SERVER_BIN: &str = "lucky-api-server";

#[derive(Parser, Debug)]
#[command(name = "lucky")]
#[command(about = "Lucky subscription service operations CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Migrate the relational schema and seed default draw settings.
    DbSetup {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
    /// Copy the document store into the relational store.
    Sync {
        /// One of users, subscriptions, rewards, draws, claims; all when omitted
        collection: Option<Collection>,
        #[arg(long, env = "FIRESTORE_EXPORT_DIR")]
        source_dir: PathBuf,
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
    /// Validate the environment and run the API server.
    Start {
        /// Server binary; defaults to the one next to this executable
        #[arg(long, env = "LUCKY_API_SERVER_BIN")]
        server_bin: Option<PathBuf>,
    },
}

pub fn db_setup(database_url: &str) -> anyhow::Result<Vec<&'static str>> {
    let store = SqlStore::open(database_url).with_context(|| format!("opening {database_url}"))?;
    let report = store.migrate()?;
    info!(
        from_version = report.from_version,
        to_version = report.to_version,
        "schema migrated"
    );
    let seeded = seed_default_settings(&store, &Env::now())?;
    Ok(seeded)
}

/// Sync one collection or all of them. Failed collections are rolled back
/// and reported; the rest still run.
pub fn sync(
    source_dir: &Path,
    database_url: &str,
    collection: Option<Collection>,
) -> anyhow::Result<Vec<(Collection, anyhow::Result<SyncReport>)>> {
    if !source_dir.is_dir() {
        bail!("source directory {} does not exist", source_dir.display());
    }
    let source = DocumentStore::open(source_dir)?;
    let target = SqlStore::open(database_url).with_context(|| format!("opening {database_url}"))?;
    target.migrate()?;

    let results = match collection {
        Some(collection) => vec![(collection, sync_collection(&source, &target, collection))],
        None => sync_all(&source, &target),
    };
    Ok(results
        .into_iter()
        .map(|(collection, result)| (collection, result.map_err(anyhow::Error::from)))
        .collect())
}

fn default_server_bin() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("locating current executable")?;
    let dir = exe
        .parent()
        .context("current executable has no parent directory")?;
    Ok(dir.join(SERVER_BIN))
}

/// Check the environment, run the server and hand back its exit code.
pub fn start(server_bin: Option<PathBuf>) -> anyhow::Result<i32> {
    Config::from_env().context("environment is not ready for the API server")?;

    let bin = match server_bin {
        Some(bin) => bin,
        None => default_server_bin()?,
    };
    info!(bin = %bin.display(), "starting API server");
    let status = Command::new(&bin)
        .status()
        .with_context(|| format!("spawning {}", bin.display()))?;

    match status.code() {
        Some(code) => Ok(code),
        None => {
            error!("API server terminated by a signal");
            Ok(1)
        }
    }
}

/// Dispatch a parsed command. Returns the process exit code.
pub fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::DbSetup { database_url } => {
            let seeded = db_setup(&database_url)?;
            println!("db-setup: OK seeded={}", serde_json::to_string(&seeded)?);
            Ok(0)
        }
        Commands::Sync {
            collection,
            source_dir,
            database_url,
        } => {
            let mut failed = 0;
            for (collection, result) in sync(&source_dir, &database_url, collection)? {
                match result {
                    Ok(report) => println!("{}", serde_json::to_string(&report)?),
                    Err(e) => {
                        failed += 1;
                        eprintln!("sync {collection} failed: {e:#}");
                    }
                }
            }
            Ok(if failed == 0 { 0 } else { 1 })
        }
        Commands::Start { server_bin } => start(server_bin),
    }
}
