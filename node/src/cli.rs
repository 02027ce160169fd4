//! # CLI Interface
//!
//! Defines the command-line argument structure for `xpxd` using `clap`
//! derive. Supports four subcommands: `init`, `deliver`, `export`, and
//! `version`. `--home`, `--chain-id`, and `--log-format` are shared by all
//! of them and fall back to `XPX_*` environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use xpx_app::config::DEFAULT_NODE_HOME_DIR;

/// XpxCosmos operator daemon.
///
/// Drives the state machine from files: load a genesis document, apply a
/// block of transactions, and export the resulting state.
#[derive(Parser, Debug)]
#[command(
    name = "xpxd",
    about = "XpxCosmos operator daemon",
    version,
    propagate_version = true
)]
pub struct XpxdCli {
    /// Node home directory. The database lives under `<home>/data`.
    ///
    /// Defaults to `$HOME/.xpx-cosmos-d`.
    #[arg(long, global = true, env = "XPX_HOME")]
    pub home: Option<PathBuf>,

    /// Chain identifier reported in block headers.
    #[arg(long, global = true, env = "XPX_CHAIN_ID", default_value = "xpx-chain")]
    pub chain_id: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "XPX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl XpxdCli {
    /// The effective home directory.
    pub fn home_dir(&self) -> PathBuf {
        match &self.home {
            Some(home) => home.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(DEFAULT_NODE_HOME_DIR),
        }
    }
}

/// Top-level subcommands for the `xpxd` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the chain from a genesis document and commit version 1.
    Init(InitArgs),
    /// Apply a block of transactions and commit it.
    Deliver(DeliverArgs),
    /// Export the committed state as a genesis document.
    Export(ExportArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the genesis JSON document.
    #[arg(long, short = 'g')]
    pub genesis: PathBuf,
}

/// Arguments for the `deliver` subcommand.
#[derive(Parser, Debug)]
pub struct DeliverArgs {
    /// File with one JSON-encoded transaction per line.
    #[arg(long, short = 't')]
    pub txs: PathBuf,

    /// Print Prometheus metrics to stdout after the block commits.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Arguments for the `export` subcommand.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Write the document here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        XpxdCli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = XpxdCli::parse_from([
            "xpxd",
            "deliver",
            "--txs",
            "block.txt",
            "--home",
            "/tmp/xpx",
            "--chain-id",
            "test-1",
        ]);
        assert_eq!(cli.home_dir(), PathBuf::from("/tmp/xpx"));
        assert_eq!(cli.chain_id, "test-1");
        match cli.command {
            Commands::Deliver(args) => {
                assert_eq!(args.txs, PathBuf::from("block.txt"));
                assert!(!args.print_metrics);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
