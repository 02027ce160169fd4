//! Request and response shapes exchanged with the consensus collaborator.
//!
//! These mirror the subset of the ABCI surface the state machine actually
//! consumes: a block header, the chain-start request carrying the genesis
//! bytes, and per-transaction results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TxError;

/// Block header delivered with every block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub chain_id: String,
    pub height: u64,
    pub time: DateTime<Utc>,
}

impl Header {
    pub fn new(chain_id: impl Into<String>, height: u64, time: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
        }
    }
}

/// Chain-start request. `app_state_bytes` is the JSON genesis document.
#[derive(Clone, Debug)]
pub struct RequestInitChain {
    pub chain_id: String,
    pub time: DateTime<Utc>,
    pub app_state_bytes: Vec<u8>,
}

/// Chain-start response. Validators are whatever the staking module
/// bonded at genesis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub validators: Vec<GenesisValidator>,
}

/// Validator entry reported at genesis and on export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Hex-encoded public key.
    pub pub_key: String,
    pub power: u64,
}

/// Outcome of `check_tx` / `deliver_tx`. `code == 0` means success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResponseDeliverTx {
    pub code: u32,
    pub log: String,
    /// `(route, message tag)` pairs for every message that ran.
    pub events: Vec<(String, String)>,
}

impl ResponseDeliverTx {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub(crate) fn rejected(err: &TxError) -> Self {
        Self {
            code: err.code(),
            log: err.to_string(),
            events: Vec::new(),
        }
    }
}

/// Result of a commit: the new version and the hash over all persistent
/// stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub version: u64,
    pub app_hash: [u8; 32],
}
