//! # Application Configuration & Constants
//!
//! Every name the state machine hands out at startup lives here: store
//! names, codec type tags, route names, and the default module parameters.
//!
//! Store names and type tags are consensus-critical. A store name decides
//! which sled tree a module's bytes land in, and a type tag is written into
//! every stored account and every wire transaction. Renaming either after a
//! chain has launched makes existing state undecodable.

// ---------------------------------------------------------------------------
// Application Identity
// ---------------------------------------------------------------------------

/// Name reported by the application to the consensus collaborator.
pub const APP_NAME: &str = "XpxCosmos";

/// Application version string.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name (under `$HOME`) used by the node binary for its data.
pub const DEFAULT_NODE_HOME_DIR: &str = ".xpx-cosmos-d";

// ---------------------------------------------------------------------------
// Store Names
// ---------------------------------------------------------------------------

/// Main store. Holds the cool module's state and anchors version loading.
pub const MAIN_STORE: &str = "main";

/// Account store, owned by the account keeper.
pub const ACCOUNT_STORE: &str = "acc";

/// Proof-of-work store.
pub const POW_STORE: &str = "pow";

/// Inter-chain packet store.
pub const IBC_STORE: &str = "ibc";

/// Simple staking store.
pub const STAKING_STORE: &str = "stake";

/// Fee collection store.
pub const FEE_STORE: &str = "fee";

/// Module parameter store.
pub const PARAMS_STORE: &str = "params";

/// Transient parameter store. Reset on every commit.
pub const TRANSIENT_PARAMS_STORE: &str = "transient_params";

// ---------------------------------------------------------------------------
// Codec Interfaces & Type Tags
// ---------------------------------------------------------------------------

/// Interface category for stored accounts.
pub const ACCOUNT_INTERFACE: &str = "Account";

/// Interface category for transaction messages.
pub const MSG_INTERFACE: &str = "Msg";

/// Interface category for transactions.
pub const TX_INTERFACE: &str = "Tx";

/// Tag for the bare account shape.
pub const TAG_BASE_ACCOUNT: &str = "auth/Account";

/// Tag for the application account shape.
pub const TAG_APP_ACCOUNT: &str = "xpx-cosmos/Account";

/// Tag for the standard transaction.
pub const TAG_STD_TX: &str = "auth/StdTx";

pub const TAG_MSG_SEND: &str = "cosmos-sdk/Send";
pub const TAG_MSG_IBC_TRANSFER: &str = "cosmos-sdk/IBCTransferMsg";
pub const TAG_MSG_IBC_RECEIVE: &str = "cosmos-sdk/IBCReceiveMsg";
pub const TAG_MSG_BOND: &str = "simplestaking/BondMsg";
pub const TAG_MSG_UNBOND: &str = "simplestaking/UnbondMsg";
pub const TAG_MSG_MINE: &str = "pow/Mine";
pub const TAG_MSG_SET_TREND: &str = "cool/SetTrend";
pub const TAG_MSG_QUIZ: &str = "cool/Quiz";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub const ROUTE_BANK: &str = "bank";
pub const ROUTE_IBC: &str = "ibc";
pub const ROUTE_STAKING: &str = "simplestaking";
pub const ROUTE_POW: &str = "pow";
pub const ROUTE_COOL: &str = "cool";

// ---------------------------------------------------------------------------
// Module Defaults
// ---------------------------------------------------------------------------

/// Coin denomination paid out as the mining reward.
pub const POW_DENOM: &str = "pow";

/// Number of reward coins per successful mine.
pub const POW_REWARD: u64 = 1;

/// Reward for answering the cool quiz correctly, paid in a coin named
/// after the answer.
pub const COOL_REWARD: u64 = 69;

/// Denomination accepted for simple staking bonds.
pub const BOND_DENOM: &str = "steak";

/// Auth params subspace name.
pub const AUTH_PARAMSPACE: &str = "auth";

/// Default maximum memo length in characters.
pub const DEFAULT_MAX_MEMO_CHARACTERS: u64 = 256;

/// Default maximum number of signatures per transaction.
pub const DEFAULT_TX_SIG_LIMIT: u64 = 7;

/// Width of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_names_are_distinct() {
        let names = [
            MAIN_STORE,
            ACCOUNT_STORE,
            POW_STORE,
            IBC_STORE,
            STAKING_STORE,
            FEE_STORE,
            PARAMS_STORE,
            TRANSIENT_PARAMS_STORE,
        ];
        let unique: std::collections::BTreeSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn type_tags_are_distinct() {
        let tags = [
            TAG_BASE_ACCOUNT,
            TAG_APP_ACCOUNT,
            TAG_STD_TX,
            TAG_MSG_SEND,
            TAG_MSG_IBC_TRANSFER,
            TAG_MSG_IBC_RECEIVE,
            TAG_MSG_BOND,
            TAG_MSG_UNBOND,
            TAG_MSG_MINE,
            TAG_MSG_SET_TREND,
            TAG_MSG_QUIZ,
        ];
        let unique: std::collections::BTreeSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn defaults_sanity() {
        assert!(POW_REWARD > 0);
        assert!(DEFAULT_TX_SIG_LIMIT > 0);
        assert_eq!(ADDRESS_LENGTH, 20);
    }
}
