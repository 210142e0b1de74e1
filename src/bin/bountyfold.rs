//! Replay recorded ledger deliveries and print the resulting board views.
//!
//! Input is JSONL, one delivery per line:
//!
//! ```text
//! {"kind": "BountyIssued", "event": {"returnValues": {"bounty_id": "1", ...}, "blockNumber": 10}}
//! ```

use bountyfold::{Board, Config, EventKind, MemoryContentStore, RawEvent};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bountyfold", version, about = "Open bounties and valid fulfilments from ledger events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay deliveries in file order and print the final views as JSON.
    Replay {
        /// JSONL file of `{"kind": ..., "event": ...}` lines.
        file: PathBuf,

        /// Board config (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Journal directory; overrides the config file.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// JSON object mapping content references to their documents.
        #[arg(long)]
        content: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct Delivery {
    kind: EventKind,
    event: RawEvent,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Replay {
            file,
            config,
            journal,
            content,
        } => replay(file, config, journal, content).await,
    }
}

async fn replay(
    file: PathBuf,
    config: Option<PathBuf>,
    journal: Option<PathBuf>,
    content: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if journal.is_some() {
        config.journal_dir = journal;
    }

    let store = MemoryContentStore::new();
    if let Some(path) = content {
        let documents: serde_json::Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(path)?)?;
        for (reference, document) in documents {
            store.insert(reference, document);
        }
    }

    let mut board = Board::builder()
        .config(config)
        .content_store(store)
        .open()?;

    let reader = BufReader::new(fs::File::open(&file)?);
    let mut delivered = 0usize;
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let delivery: Delivery = match serde_json::from_str(&line) {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!("{}:{}: skipping unreadable delivery: {e}", file.display(), number + 1);
                continue;
            }
        };
        match board.deliver(delivery.kind, delivery.event) {
            Ok(_) => delivered += 1,
            Err(e) => warn!("{}:{}: {e}", file.display(), number + 1),
        }
    }

    let views = board.shutdown().await;
    info!(
        "replayed {delivered} deliveries: {} open bounties, {} valid fulfilments",
        views.open_bounties.len(),
        views.valid_fulfilments.len()
    );
    println!("{}", serde_json::to_string_pretty(&*views)?);
    Ok(())
}
