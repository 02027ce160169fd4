//! # Genesis Controller
//!
//! Carries the application from an empty database to a ready ledger, and
//! back out again as a document.
//!
//! ```text
//!   Uninitialized --init_chain(doc)--> Initializing --ok--> Ready
//!         ^                                 |
//!         +----------- error ---------------+
//! ```
//!
//! Initialization decodes the whole document before touching any module,
//! then feeds each module its section in a fixed order:
//!
//! ```text
//! auth params -> collected fees -> accounts -> pow -> cool -> ibc -> staking
//! ```
//!
//! All writes go through the caller's context, so a failure anywhere leaves
//! nothing behind; the caller only flushes once this returns `Ok`. Export
//! walks the same modules in the same order and produces the same shape,
//! so `export(init(doc)) == doc` up to account ordering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::Keepers;
use crate::context::Context;
use crate::error::{GenesisError, GenesisResult};
use crate::modules::auth::AuthGenesis;
use crate::modules::cool::CoolGenesis;
use crate::modules::ibc::IbcGenesis;
use crate::modules::pow::PowGenesis;
use crate::modules::staking::StakingGenesis;
use crate::types::{Address, Coins};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An account as it appears in a genesis document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub coins: Coins,
}

/// The genesis document. `accounts`, `pow`, and `cool` are required; the
/// remaining sections default to empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisState {
    pub accounts: Vec<GenesisAccount>,
    pub pow: PowGenesis,
    pub cool: CoolGenesis,
    #[serde(default)]
    pub auth: AuthGenesis,
    #[serde(default)]
    pub ibc: IbcGenesis,
    #[serde(default)]
    pub staking: StakingGenesis,
}

impl GenesisState {
    /// Decodes a document. Missing required sections and unknown fields
    /// are both errors.
    pub fn from_json(bytes: &[u8]) -> GenesisResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| GenesisError::Parse(e.to_string()))
    }

    /// Indented JSON, the form written by export.
    pub fn to_json_pretty(&self) -> GenesisResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| GenesisError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// GenesisModule
// ---------------------------------------------------------------------------

/// A module with a section in the genesis document.
pub trait GenesisModule {
    /// Module name used in errors.
    const NAME: &'static str;

    /// The module's section of the document.
    type State;

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &Self::State) -> GenesisResult<()>;

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<Self::State>;
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenesisPhase {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug)]
pub struct GenesisController {
    phase: GenesisPhase,
}

impl GenesisController {
    /// A controller for a chain that has never been initialized.
    pub fn new() -> Self {
        Self {
            phase: GenesisPhase::Uninitialized,
        }
    }

    /// A controller for a chain restored from committed state.
    pub fn ready() -> Self {
        Self {
            phase: GenesisPhase::Ready,
        }
    }

    pub fn phase(&self) -> GenesisPhase {
        self.phase
    }

    /// Decodes `document` and loads every module. On error the controller
    /// returns to `Uninitialized` and the caller must discard `ctx`.
    pub fn init_chain(
        &mut self,
        ctx: &mut Context<'_>,
        keepers: &Keepers,
        document: &[u8],
    ) -> GenesisResult<GenesisState> {
        self.expect_phase(GenesisPhase::Uninitialized)?;
        self.phase = GenesisPhase::Initializing;

        match GenesisState::from_json(document).and_then(|state| {
            apply(ctx, keepers, &state)?;
            Ok(state)
        }) {
            Ok(state) => {
                self.phase = GenesisPhase::Ready;
                info!(accounts = state.accounts.len(), "genesis applied");
                Ok(state)
            }
            Err(err) => {
                self.phase = GenesisPhase::Uninitialized;
                warn!(error = %err, "genesis rejected");
                Err(err)
            }
        }
    }

    /// Snapshots every module into a document.
    pub fn export(&self, ctx: &mut Context<'_>, keepers: &Keepers) -> GenesisResult<GenesisState> {
        self.expect_phase(GenesisPhase::Ready)?;

        let auth = AuthGenesis {
            params: keepers.account.export_genesis(ctx)?,
            collected_fees: keepers.fee.export_genesis(ctx)?,
        };
        let mut accounts = Vec::new();
        keepers
            .account
            .iterate_accounts(ctx, |acc| {
                accounts.push(GenesisAccount {
                    address: acc.address(),
                    coins: acc.coins().clone(),
                });
                false
            })
            .map_err(GenesisError::module("accounts"))?;

        Ok(GenesisState {
            accounts,
            pow: keepers.pow.export_genesis(ctx)?,
            cool: keepers.cool.export_genesis(ctx)?,
            auth,
            ibc: keepers.ibc.export_genesis(ctx)?,
            staking: keepers.staking.export_genesis(ctx)?,
        })
    }

    /// Returns to `Uninitialized` after the caller failed to store a
    /// successful initialization.
    pub(crate) fn abort(&mut self) {
        self.phase = GenesisPhase::Uninitialized;
    }

    fn expect_phase(&self, expected: GenesisPhase) -> GenesisResult<()> {
        if self.phase != expected {
            return Err(GenesisError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}

impl Default for GenesisController {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(ctx: &mut Context<'_>, keepers: &Keepers, state: &GenesisState) -> GenesisResult<()> {
    keepers.account.init_genesis(ctx, &state.auth.params)?;
    keepers.fee.init_genesis(ctx, &state.auth.collected_fees)?;
    init_accounts(ctx, keepers, &state.accounts)?;
    keepers.pow.init_genesis(ctx, &state.pow)?;
    keepers.cool.init_genesis(ctx, &state.cool)?;
    keepers.ibc.init_genesis(ctx, &state.ibc)?;
    keepers.staking.init_genesis(ctx, &state.staking)?;
    Ok(())
}

fn init_accounts(ctx: &mut Context<'_>, keepers: &Keepers, accounts: &[GenesisAccount]) -> GenesisResult<()> {
    let mut seen = BTreeSet::new();
    for genesis_acc in accounts {
        if !seen.insert(genesis_acc.address) {
            return Err(GenesisError::ModuleRejected {
                module: "accounts",
                reason: format!("duplicate account {}", genesis_acc.address),
            });
        }
        let mut acc = keepers
            .account
            .new_account_with_address(ctx, genesis_acc.address)
            .map_err(GenesisError::module("accounts"))?;
        acc.set_coins(genesis_acc.coins.clone());
        keepers
            .account
            .set_account(ctx, &acc)
            .map_err(GenesisError::module("accounts"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::AuthParams;
    use crate::testutil::TestEnv;
    use serde_json::json;

    fn document() -> serde_json::Value {
        let a = Address::from_pub_key(b"a");
        let b = Address::from_pub_key(b"b");
        json!({
            "accounts": [
                { "address": a.to_hex(), "coins": [ { "denom": "steak", "amount": 100 } ] },
                { "address": b.to_hex(), "coins": [] }
            ],
            "pow": { "difficulty": 1, "count": 0 },
            "cool": { "trend": "icecold" }
        })
    }

    #[test]
    fn init_then_export_round_trips() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut controller = GenesisController::new();
        let bytes = document().to_string().into_bytes();

        let mut loaded = controller.init_chain(&mut ctx, &env.keepers, &bytes).unwrap();
        assert_eq!(controller.phase(), GenesisPhase::Ready);

        let mut exported = controller.export(&mut ctx, &env.keepers).unwrap();
        loaded.accounts.sort_by_key(|a| a.address);
        exported.accounts.sort_by_key(|a| a.address);
        assert_eq!(exported, loaded);
    }

    #[test]
    fn missing_required_section_is_a_parse_error() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut doc = document();
        doc.as_object_mut().unwrap().remove("pow");

        let mut controller = GenesisController::new();
        let err = controller
            .init_chain(&mut ctx, &env.keepers, doc.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, GenesisError::Parse(_)));
        assert_eq!(controller.phase(), GenesisPhase::Uninitialized);
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn unknown_section_is_a_parse_error() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut doc = document();
        doc["mystery"] = json!({});
        let err = GenesisController::new()
            .init_chain(&mut ctx, &env.keepers, doc.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, GenesisError::Parse(_)));
    }

    #[test]
    fn module_rejection_resets_phase() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut doc = document();
        doc["pow"]["difficulty"] = json!(0);

        let mut controller = GenesisController::new();
        let err = controller
            .init_chain(&mut ctx, &env.keepers, doc.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, GenesisError::ModuleRejected { module: "pow", .. }));
        assert_eq!(controller.phase(), GenesisPhase::Uninitialized);
    }

    #[test]
    fn collected_fees_travel_with_the_auth_section() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut doc = document();
        doc["auth"] = json!({
            "max_memo_characters": 256,
            "tx_sig_limit": 7,
            "collected_fees": [ { "denom": "steak", "amount": 3 } ]
        });

        let mut controller = GenesisController::new();
        controller
            .init_chain(&mut ctx, &env.keepers, doc.to_string().as_bytes())
            .unwrap();
        assert_eq!(
            env.keepers.fee.get_collected_fees(&mut ctx).unwrap(),
            Coins::single("steak", 3)
        );

        let exported = controller.export(&mut ctx, &env.keepers).unwrap();
        assert_eq!(exported.auth.collected_fees, Coins::single("steak", 3));
        assert_eq!(exported.auth.params.tx_sig_limit, 7);
    }

    #[test]
    fn auth_section_defaults_to_no_fees() {
        let state = GenesisState::from_json(document().to_string().as_bytes()).unwrap();
        assert!(state.auth.collected_fees.is_empty());
        assert_eq!(state.auth.params, AuthParams::default());
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let mut doc = document();
        let first = doc["accounts"][0].clone();
        doc["accounts"].as_array_mut().unwrap().push(first);
        let err = GenesisController::new()
            .init_chain(&mut ctx, &env.keepers, doc.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, GenesisError::ModuleRejected { module: "accounts", .. }));
    }

    #[test]
    fn genesis_runs_once() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let bytes = document().to_string().into_bytes();
        let mut controller = GenesisController::new();
        controller.init_chain(&mut ctx, &env.keepers, &bytes).unwrap();
        let err = controller.init_chain(&mut ctx, &env.keepers, &bytes).unwrap_err();
        assert!(matches!(
            err,
            GenesisError::InvalidPhase {
                expected: GenesisPhase::Uninitialized,
                actual: GenesisPhase::Ready
            }
        ));
    }

    #[test]
    fn export_before_init_is_refused() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        assert!(matches!(
            GenesisController::new().export(&mut ctx, &env.keepers),
            Err(GenesisError::InvalidPhase { .. })
        ));
    }
}
