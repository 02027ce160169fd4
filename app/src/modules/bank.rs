//! # Bank Module
//!
//! Coin movement between accounts. The bank keeper holds no store of its
//! own; balances live on accounts, so every operation goes through the
//! account keeper.
//!
//! Every transfer computes both resulting balances before writing either
//! one, so a failed transfer leaves no half-applied state even outside a
//! transaction overlay.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::auth::{Account, AccountKeeper};
use crate::codec::Codec;
use crate::config::{MSG_INTERFACE, ROUTE_BANK, TAG_MSG_SEND};
use crate::context::Context;
use crate::error::{ConfigError, TxError, TxResult};
use crate::router::{unrecognized, Handler};
use crate::tx::Msg;
use crate::types::{Address, Coins};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Moves `amount` from one account to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: Address,
    pub to_address: Address,
    pub amount: Coins,
}

impl MsgSend {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.from_address.is_empty() {
            return Err(TxError::InvalidAddress("empty sender".into()));
        }
        if self.to_address.is_empty() {
            return Err(TxError::InvalidAddress("empty recipient".into()));
        }
        if self.amount.is_empty() {
            return Err(TxError::InvalidCoins("send amount is empty".into()));
        }
        Ok(())
    }
}

pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_SEND)
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct BankKeeper {
    accounts: AccountKeeper,
}

impl BankKeeper {
    pub fn new(accounts: AccountKeeper) -> Self {
        Self { accounts }
    }

    pub fn get_coins(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Coins> {
        self.accounts.get_coins(ctx, addr)
    }

    pub fn has_coins(&self, ctx: &mut Context<'_>, addr: &Address, amount: &Coins) -> TxResult<bool> {
        Ok(self.get_coins(ctx, addr)?.is_all_gte(amount))
    }

    /// Removes `amount` from `addr`. Returns the new balance.
    pub fn subtract_coins(&self, ctx: &mut Context<'_>, addr: &Address, amount: &Coins) -> TxResult<Coins> {
        let acc = self.debited(ctx, addr, amount)?;
        self.accounts.set_account(ctx, &acc)?;
        Ok(acc.coins().clone())
    }

    /// Adds `amount` to `addr`, creating the account if needed. Returns the
    /// new balance.
    pub fn add_coins(&self, ctx: &mut Context<'_>, addr: &Address, amount: &Coins) -> TxResult<Coins> {
        let acc = self.credited(ctx, addr, amount)?;
        self.accounts.set_account(ctx, &acc)?;
        Ok(acc.coins().clone())
    }

    /// Moves `amount` from `from` to `to`. Nothing is written unless both
    /// sides succeed.
    pub fn send_coins(
        &self,
        ctx: &mut Context<'_>,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> TxResult<()> {
        if from == to {
            // Still must be affordable.
            self.debited(ctx, from, amount)?;
            return Ok(());
        }
        let sender = self.debited(ctx, from, amount)?;
        let recipient = self.credited(ctx, to, amount)?;
        self.accounts.set_account(ctx, &sender)?;
        self.accounts.set_account(ctx, &recipient)?;
        debug!(%from, %to, %amount, "coins sent");
        Ok(())
    }

    fn debited(&self, ctx: &mut Context<'_>, addr: &Address, amount: &Coins) -> TxResult<Account> {
        let Some(mut acc) = self.accounts.get_account(ctx, addr)? else {
            return Err(TxError::InsufficientFunds {
                address: *addr,
                available: Coins::empty(),
                required: amount.clone(),
            });
        };
        let remaining = acc
            .coins()
            .checked_sub(amount)
            .ok_or_else(|| TxError::InsufficientFunds {
                address: *addr,
                available: acc.coins().clone(),
                required: amount.clone(),
            })?;
        acc.set_coins(remaining);
        Ok(acc)
    }

    fn credited(&self, ctx: &mut Context<'_>, addr: &Address, amount: &Coins) -> TxResult<Account> {
        let mut acc = match self.accounts.get_account(ctx, addr)? {
            Some(acc) => acc,
            None => self.accounts.new_account_with_address(ctx, *addr)?,
        };
        let total = acc
            .coins()
            .checked_add(amount)
            .ok_or_else(|| TxError::InvalidCoins(format!("balance overflow for {addr}")))?;
        acc.set_coins(total);
        Ok(acc)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct BankHandler {
    keeper: BankKeeper,
}

impl BankHandler {
    pub fn new(keeper: BankKeeper) -> Self {
        Self { keeper }
    }
}

impl Handler for BankHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        match msg {
            Msg::Send(send) => {
                self.keeper
                    .send_coins(ctx, &send.from_address, &send.to_address, &send.amount)
            }
            other => Err(unrecognized(ROUTE_BANK, other)),
        }
    }
}
