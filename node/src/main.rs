// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # XpxCosmos Daemon
//!
//! Entry point for the `xpxd` binary. Parses CLI arguments, initializes
//! logging and metrics, and drives the state machine stored under the home
//! directory.
//!
//! The binary supports four subcommands:
//!
//! - `init`    : load a genesis document and commit version 1
//! - `deliver` : apply a file of transactions as one block and commit it
//! - `export`  : write the committed state as a genesis document
//! - `version` : print build version information
//!
//! Rejected transactions are logged and counted. Any fatal application
//! error ends the process with a non-zero exit status.

mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use xpx_app::config::{APP_NAME, APP_VERSION};
use xpx_app::genesis::GenesisPhase;
use xpx_app::store::MultiStore;
use xpx_app::types::{CommitInfo, Header, RequestInitChain};
use xpx_app::XpxApp;

use cli::{Commands, XpxdCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// Database directory under the home directory.
const DATA_DIR: &str = "data";

fn main() -> Result<()> {
    let cli = XpxdCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );
    let home = cli.home_dir();

    match cli.command {
        Commands::Init(args) => {
            let info = init_chain(&home, &cli.chain_id, &args.genesis)?;
            println!("Chain initialized.");
            println!("  Home     : {}", home.display());
            println!("  Chain id : {}", cli.chain_id);
            println!("  Version  : {}", info.version);
            println!("  App hash : {}", hex::encode(info.app_hash));
            Ok(())
        }
        Commands::Deliver(args) => {
            let metrics = NodeMetrics::new().context("failed to register metrics")?;
            let summary = deliver_block(&home, &cli.chain_id, &args.txs, &metrics)?;
            println!(
                "Block {} committed: {} delivered, {} rejected, app hash {}",
                summary.commit.version,
                summary.delivered,
                summary.rejected,
                hex::encode(summary.commit.app_hash)
            );
            if args.print_metrics {
                print!("{}", metrics.encode().context("failed to encode metrics")?);
            }
            Ok(())
        }
        Commands::Export(args) => {
            let document = export_state(&home)?;
            match args.output {
                Some(path) => fs::write(&path, &document)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", String::from_utf8_lossy(&document)),
            }
            Ok(())
        }
        Commands::Version => {
            println!("xpxd {APP_VERSION}");
            println!("app  {APP_NAME}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Outcome of one delivered block.
#[derive(Debug)]
struct BlockSummary {
    commit: CommitInfo,
    delivered: u64,
    rejected: u64,
}

fn data_dir(home: &Path) -> PathBuf {
    home.join(DATA_DIR)
}

fn open_app(home: &Path) -> Result<XpxApp> {
    let path = data_dir(home);
    fs::create_dir_all(&path)
        .with_context(|| format!("failed to create data directory: {}", path.display()))?;
    let store = MultiStore::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    let app = XpxApp::new(store).context("failed to assemble application")?;
    tracing::info!(
        path = %path.display(),
        version = app.last_commit().version,
        "database opened"
    );
    Ok(app)
}

fn init_chain(home: &Path, chain_id: &str, genesis: &Path) -> Result<CommitInfo> {
    let document = fs::read(genesis)
        .with_context(|| format!("failed to read genesis document {}", genesis.display()))?;
    let mut app = open_app(home)?;

    let response = app
        .init_chain(&RequestInitChain {
            chain_id: chain_id.to_string(),
            time: Utc::now(),
            app_state_bytes: document,
        })
        .with_context(|| format!("genesis {} rejected", genesis.display()))?;
    let info = app.commit().context("failed to commit genesis")?;

    tracing::info!(
        chain_id,
        validators = response.validators.len(),
        version = info.version,
        "genesis committed"
    );
    Ok(info)
}

fn deliver_block(home: &Path, chain_id: &str, txs: &Path, metrics: &NodeMetrics) -> Result<BlockSummary> {
    let contents = fs::read_to_string(txs)
        .with_context(|| format!("failed to read transactions from {}", txs.display()))?;
    let mut app = open_app(home)?;
    if app.genesis_phase() != GenesisPhase::Ready {
        bail!("chain under {} is not initialized; run `xpxd init` first", home.display());
    }

    let height = app.last_commit().version + 1;
    app.begin_block(Header::new(chain_id, height, Utc::now()));

    let (mut delivered, mut rejected) = (0u64, 0u64);
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let res = app
            .deliver_tx(line.as_bytes())
            .with_context(|| format!("transaction on line {} halted the chain", index + 1))?;
        if res.is_ok() {
            delivered += 1;
            metrics.txs_delivered_total.inc();
        } else {
            rejected += 1;
            metrics.txs_rejected_total.inc();
            tracing::warn!(line = index + 1, code = res.code, log = %res.log, "transaction rejected");
        }
    }

    let commit = app.commit().context("failed to commit block")?;
    metrics.blocks_committed_total.inc();
    metrics.block_height.set(i64::try_from(commit.version).unwrap_or(i64::MAX));

    Ok(BlockSummary {
        commit,
        delivered,
        rejected,
    })
}

fn export_state(home: &Path) -> Result<Vec<u8>> {
    let app = open_app(home)?;
    let (document, validators) = app
        .export_app_state_and_validators()
        .context("failed to export state")?;
    tracing::info!(
        bytes = document.len(),
        validators = validators.len(),
        "state exported"
    );
    Ok(document)
}
