//! # Cool Module
//!
//! Keeps one "trend" word in the main store. Anyone may set it; anyone who
//! guesses it gets paid in a coin named after the answer.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::bank::BankKeeper;
use crate::codec::Codec;
use crate::config::{COOL_REWARD, MSG_INTERFACE, ROUTE_COOL, TAG_MSG_QUIZ, TAG_MSG_SET_TREND};
use crate::context::{Context, ExecMode};
use crate::error::{ConfigError, GenesisError, GenesisResult, TxError, TxResult};
use crate::genesis::GenesisModule;
use crate::router::{unrecognized, Handler};
use crate::store::{KvStore, StoreKey};
use crate::tx::Msg;
use crate::types::{Address, Coin, Coins};

pub const MODULE_NAME: &str = "cool";

const TREND_KEY: &[u8] = b"TrendKey";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Replaces the current trend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetTrend {
    pub sender: Address,
    pub cool: String,
}

impl MsgSetTrend {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.sender.is_empty() {
            return Err(TxError::InvalidAddress("empty sender".into()));
        }
        if self.cool.is_empty() {
            return Err(TxError::InvalidMsg("trend cannot be empty".into()));
        }
        Ok(())
    }
}

/// Guesses the current trend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgQuiz {
    pub sender: Address,
    pub cool_answer: String,
}

impl MsgQuiz {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.sender.is_empty() {
            return Err(TxError::InvalidAddress("empty sender".into()));
        }
        if self.cool_answer.is_empty() {
            return Err(TxError::InvalidMsg("answer cannot be empty".into()));
        }
        Ok(())
    }
}

pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_SET_TREND)?;
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_QUIZ)
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolGenesis {
    pub trend: String,
}

#[derive(Clone, Debug)]
pub struct CoolKeeper {
    key: StoreKey,
    bank: BankKeeper,
}

impl CoolKeeper {
    pub fn new(key: StoreKey, bank: BankKeeper) -> Self {
        Self { key, bank }
    }

    pub fn trend(&self, ctx: &mut Context<'_>) -> TxResult<String> {
        let bytes = ctx.kv_store(&self.key)?.get(TREND_KEY)?.unwrap_or_default();
        String::from_utf8(bytes).map_err(|e| TxError::Internal(format!("corrupt trend: {e}")))
    }

    pub fn set_trend(&self, ctx: &mut Context<'_>, trend: &str) -> TxResult<()> {
        ctx.kv_store(&self.key)?.set(TREND_KEY, trend.as_bytes().to_vec());
        Ok(())
    }

    pub fn check_trend(&self, ctx: &mut Context<'_>, guess: &str) -> TxResult<bool> {
        Ok(self.trend(ctx)? == guess)
    }

    /// Pays `COOL_REWARD` coins of denomination `answer` to `sender`.
    fn reward(&self, ctx: &mut Context<'_>, sender: &Address, answer: &str) -> TxResult<()> {
        let bonus = Coins::new(vec![Coin::new(answer, COOL_REWARD)])?;
        self.bank.add_coins(ctx, sender, &bonus)?;
        info!(%sender, answer, "cool quiz solved");
        Ok(())
    }
}

impl GenesisModule for CoolKeeper {
    const NAME: &'static str = MODULE_NAME;
    type State = CoolGenesis;

    fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &CoolGenesis) -> GenesisResult<()> {
        if genesis.trend.is_empty() {
            return Err(GenesisError::ModuleRejected {
                module: MODULE_NAME,
                reason: "trend cannot be empty".into(),
            });
        }
        self.set_trend(ctx, &genesis.trend)
            .map_err(GenesisError::module(MODULE_NAME))
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<CoolGenesis> {
        let trend = self.trend(ctx).map_err(GenesisError::module(MODULE_NAME))?;
        Ok(CoolGenesis { trend })
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct CoolHandler {
    keeper: CoolKeeper,
}

impl CoolHandler {
    pub fn new(keeper: CoolKeeper) -> Self {
        Self { keeper }
    }
}

impl Handler for CoolHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        match msg {
            Msg::SetTrend(m) => self.keeper.set_trend(ctx, &m.cool),
            Msg::Quiz(m) => {
                if !self.keeper.check_trend(ctx, &m.cool_answer)? {
                    return Err(TxError::InvalidMsg("incorrect cool answer".into()));
                }
                // Mempool admission only checks the answer.
                if ctx.mode() == ExecMode::Check {
                    return Ok(());
                }
                self.keeper.reward(ctx, &m.sender, &m.cool_answer)
            }
            other => Err(unrecognized(ROUTE_COOL, other)),
        }
    }
}
