//! # Auth Module
//!
//! Accounts, the fee collector, auth parameters, and the standard ante
//! handler. The account keeper is the only component that reads or writes
//! the `acc` store; every other module moves coins through the bank
//! keeper, which in turn goes through the account keeper.

pub mod account;
pub mod ante;
pub mod fee;
pub mod keeper;

pub use account::{Account, AppAccount, BaseAccount};
pub use ante::{AnteHandler, StdAnteHandler};
pub use fee::FeeCollectionKeeper;
pub use keeper::{AccountKeeper, AuthParams};

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::config::{ACCOUNT_INTERFACE, TAG_APP_ACCOUNT, TAG_BASE_ACCOUNT};
use crate::context::Context;
use crate::error::{ConfigError, GenesisError, GenesisResult};
use crate::genesis::GenesisModule;
use crate::types::Coins;

pub const MODULE_NAME: &str = "auth";

/// The `auth` section of the genesis document: parameters at the top
/// level plus the fees collected so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGenesis {
    #[serde(flatten)]
    pub params: AuthParams,
    #[serde(default)]
    pub collected_fees: Coins,
}

/// Registers the account interface and both account shapes.
pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_interface(ACCOUNT_INTERFACE)?;
    codec.register_concrete(ACCOUNT_INTERFACE, TAG_BASE_ACCOUNT)?;
    codec.register_concrete(ACCOUNT_INTERFACE, TAG_APP_ACCOUNT)
}

impl GenesisModule for AccountKeeper {
    const NAME: &'static str = MODULE_NAME;
    type State = AuthParams;

    fn init_genesis(&self, ctx: &mut Context<'_>, params: &AuthParams) -> GenesisResult<()> {
        if params.tx_sig_limit == 0 {
            return Err(GenesisError::ModuleRejected {
                module: MODULE_NAME,
                reason: "tx_sig_limit must be positive".into(),
            });
        }
        self.set_params(ctx, params)
            .map_err(GenesisError::module(MODULE_NAME))
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<AuthParams> {
        self.params(ctx).map_err(GenesisError::module(MODULE_NAME))
    }
}
