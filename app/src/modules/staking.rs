//! # Simple Staking
//!
//! Bonding locks `steak` coins from an account and records voting power
//! equal to the bonded amount. Unbonding releases the whole bond at once.
//! Bonds are the validator set reported at genesis and on export.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::bank::BankKeeper;
use crate::codec::{Codec, Format};
use crate::config::{BOND_DENOM, MSG_INTERFACE, ROUTE_STAKING, TAG_MSG_BOND, TAG_MSG_UNBOND};
use crate::context::Context;
use crate::error::{ConfigError, GenesisError, GenesisResult, TxError, TxResult};
use crate::genesis::GenesisModule;
use crate::router::{unrecognized, Handler};
use crate::store::{KvStore, StoreKey};
use crate::tx::Msg;
use crate::types::{Address, Coin, Coins, GenesisValidator};

pub const MODULE_NAME: &str = "staking";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBond {
    pub address: Address,
    pub stake: Coin,
    /// Hex-encoded validator public key.
    pub pub_key: String,
}

impl MsgBond {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.address.is_empty() {
            return Err(TxError::InvalidAddress("empty bonder".into()));
        }
        if self.stake.amount == 0 {
            return Err(TxError::InvalidCoins("stake is empty".into()));
        }
        match hex::decode(&self.pub_key) {
            Ok(bytes) if !bytes.is_empty() => Ok(()),
            Ok(_) => Err(TxError::InvalidPubKey("empty validator key".into())),
            Err(e) => Err(TxError::InvalidPubKey(e.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnbond {
    pub address: Address,
}

impl MsgUnbond {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.address.is_empty() {
            return Err(TxError::InvalidAddress("empty bonder".into()));
        }
        Ok(())
    }
}

pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_BOND)?;
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_UNBOND)
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

/// One account's bond.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub address: Address,
    pub pub_key: String,
    pub power: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    #[serde(default)]
    pub bonds: Vec<Bond>,
}

impl StakingGenesis {
    /// Validator set implied by the bonds.
    pub fn validators(&self) -> Vec<GenesisValidator> {
        self.bonds.iter().map(Bond::validator).collect()
    }
}

impl Bond {
    pub fn validator(&self) -> GenesisValidator {
        GenesisValidator {
            pub_key: self.pub_key.clone(),
            power: self.power,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StakingKeeper {
    key: StoreKey,
    bank: BankKeeper,
}

impl StakingKeeper {
    pub fn new(key: StoreKey, bank: BankKeeper) -> Self {
        Self { key, bank }
    }

    pub fn bond_of(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Option<Bond>> {
        match ctx.kv_store(&self.key)?.get(addr.as_bytes())? {
            Some(bytes) => Ok(Some(Format::Binary.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_bond(&self, ctx: &mut Context<'_>, bond: &Bond) -> TxResult<()> {
        let bytes = Format::Binary.encode(bond)?;
        ctx.kv_store(&self.key)?.set(bond.address.as_bytes(), bytes);
        Ok(())
    }

    /// Locks `stake` from `addr`. Returns the resulting power.
    pub fn bond(&self, ctx: &mut Context<'_>, addr: &Address, pub_key: &str, stake: &Coin) -> TxResult<u64> {
        if stake.denom != BOND_DENOM {
            return Err(TxError::InvalidCoins(format!(
                "only {BOND_DENOM} can be bonded, got {}",
                stake.denom
            )));
        }
        self.bank
            .subtract_coins(ctx, addr, &Coins::single(BOND_DENOM, stake.amount))?;
        let mut bond = self.bond_of(ctx, addr)?.unwrap_or_else(|| Bond {
            address: *addr,
            pub_key: pub_key.to_string(),
            power: 0,
        });
        bond.power = bond
            .power
            .checked_add(stake.amount)
            .ok_or_else(|| TxError::InvalidCoins("bond power overflow".into()))?;
        self.set_bond(ctx, &bond)?;
        info!(%addr, power = bond.power, "bonded");
        Ok(bond.power)
    }

    /// Releases the whole bond of `addr`. Returns what was released.
    pub fn unbond(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Bond> {
        let bond = self
            .bond_of(ctx, addr)?
            .ok_or_else(|| TxError::InvalidMsg(format!("{addr} has no bond")))?;
        ctx.kv_store(&self.key)?.delete(addr.as_bytes());
        self.bank
            .add_coins(ctx, addr, &Coins::single(BOND_DENOM, bond.power))?;
        info!(%addr, power = bond.power, "unbonded");
        Ok(bond)
    }

    /// Every bond, in address order.
    pub fn bonds(&self, ctx: &mut Context<'_>) -> TxResult<Vec<Bond>> {
        let store = ctx.kv_store(&self.key)?;
        let bonds = store
            .prefix_iter(&[])
            .map(|entry| -> TxResult<Bond> {
                let (_, bytes) = entry?;
                Ok(Format::Binary.decode(&bytes)?)
            })
            .collect();
        bonds
    }

    /// Current validator set derived from the bonds.
    pub fn validators(&self, ctx: &mut Context<'_>) -> TxResult<Vec<GenesisValidator>> {
        Ok(self.bonds(ctx)?.iter().map(Bond::validator).collect())
    }
}

impl GenesisModule for StakingKeeper {
    const NAME: &'static str = MODULE_NAME;
    type State = StakingGenesis;

    fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &StakingGenesis) -> GenesisResult<()> {
        for bond in &genesis.bonds {
            if bond.power == 0 {
                return Err(GenesisError::ModuleRejected {
                    module: MODULE_NAME,
                    reason: format!("bond for {} has zero power", bond.address),
                });
            }
            let exists = self
                .bond_of(ctx, &bond.address)
                .map_err(GenesisError::module(MODULE_NAME))?
                .is_some();
            if exists {
                return Err(GenesisError::ModuleRejected {
                    module: MODULE_NAME,
                    reason: format!("duplicate bond for {}", bond.address),
                });
            }
            self.set_bond(ctx, bond)
                .map_err(GenesisError::module(MODULE_NAME))?;
        }
        Ok(())
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<StakingGenesis> {
        let bonds = self.bonds(ctx).map_err(GenesisError::module(MODULE_NAME))?;
        Ok(StakingGenesis { bonds })
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct StakingHandler {
    keeper: StakingKeeper,
}

impl StakingHandler {
    pub fn new(keeper: StakingKeeper) -> Self {
        Self { keeper }
    }
}

impl Handler for StakingHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        match msg {
            Msg::Bond(m) => self
                .keeper
                .bond(ctx, &m.address, &m.pub_key, &m.stake)
                .map(|_| ()),
            Msg::Unbond(m) => self.keeper.unbond(ctx, &m.address).map(|_| ()),
            other => Err(unrecognized(ROUTE_STAKING, other)),
        }
    }
}
