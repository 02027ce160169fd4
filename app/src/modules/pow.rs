//! # Proof-of-Work Module
//!
//! Anyone can mint a fixed reward by submitting a proof of work for the
//! next count. A proof is the first 16 hex characters of
//!
//! ```text
//! SHA-256(sender_address || hex(count) || hex(nonce))
//! ```
//!
//! read as a big-endian `u64`, and it must be below `u64::MAX / difficulty`.
//! Each successful mine advances both the count and the difficulty by one,
//! so a proof can never be replayed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::bank::BankKeeper;
use crate::codec::{Codec, Format};
use crate::config::{MSG_INTERFACE, ROUTE_POW, TAG_MSG_MINE};
use crate::context::Context;
use crate::error::{ConfigError, GenesisError, GenesisResult, TxError, TxResult};
use crate::genesis::GenesisModule;
use crate::router::{unrecognized, Handler};
use crate::store::{KvStore, StoreKey};
use crate::tx::Msg;
use crate::types::{Address, Coin, Coins};

pub const MODULE_NAME: &str = "pow";

const LAST_DIFFICULTY_KEY: &[u8] = b"lastDifficultyKey";
const LAST_COUNT_KEY: &[u8] = b"lastCountKey";

/// Width of a proof in hex characters.
const PROOF_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMine {
    pub sender: Address,
    pub difficulty: u64,
    pub count: u64,
    pub nonce: u64,
    /// Hex prefix of the work hash.
    pub proof: String,
}

/// Hex proof for the given inputs.
pub fn compute_proof(sender: &Address, count: u64, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_bytes());
    hasher.update(format!("{count:x}").as_bytes());
    hasher.update(format!("{nonce:x}").as_bytes());
    let mut proof = hex::encode(hasher.finalize());
    proof.truncate(PROOF_LENGTH);
    proof
}

fn below_target(proof: &str, difficulty: u64) -> bool {
    match u64::from_str_radix(proof, 16) {
        Ok(value) => value < u64::MAX / difficulty,
        Err(_) => false,
    }
}

impl MsgMine {
    /// Searches nonces until one meets `difficulty`.
    pub fn mine(sender: Address, difficulty: u64, count: u64) -> Self {
        let difficulty = difficulty.max(1);
        let mut nonce = 0u64;
        loop {
            let proof = compute_proof(&sender, count, nonce);
            if below_target(&proof, difficulty) {
                return Self {
                    sender,
                    difficulty,
                    count,
                    nonce,
                    proof,
                };
            }
            nonce += 1;
        }
    }

    pub fn validate_basic(&self) -> TxResult<()> {
        if self.sender.is_empty() {
            return Err(TxError::InvalidAddress("empty miner".into()));
        }
        if self.difficulty == 0 {
            return Err(TxError::InvalidMsg("difficulty must be positive".into()));
        }
        if compute_proof(&self.sender, self.count, self.nonce) != self.proof {
            return Err(TxError::InvalidMsg("proof does not match sender, count and nonce".into()));
        }
        if !below_target(&self.proof, self.difficulty) {
            return Err(TxError::InvalidMsg(format!(
                "proof is not below the target for difficulty {}",
                self.difficulty
            )));
        }
        Ok(())
    }
}

pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_MINE)
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

/// Reward paid per successful mine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowConfig {
    pub denomination: String,
    pub reward: u64,
}

impl PowConfig {
    pub fn new(denomination: &str, reward: u64) -> Self {
        Self {
            denomination: denomination.to_string(),
            reward,
        }
    }
}

/// Genesis section: the current difficulty and count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowGenesis {
    pub difficulty: u64,
    pub count: u64,
}

#[derive(Clone, Debug)]
pub struct PowKeeper {
    key: StoreKey,
    config: PowConfig,
    bank: BankKeeper,
}

impl PowKeeper {
    pub fn new(key: StoreKey, config: PowConfig, bank: BankKeeper) -> Self {
        Self { key, config, bank }
    }

    fn read_u64(&self, ctx: &mut Context<'_>, key: &[u8]) -> TxResult<u64> {
        match ctx.kv_store(&self.key)?.get(key)? {
            Some(bytes) => Ok(Format::Binary.decode(&bytes)?),
            None => Err(TxError::Internal(format!(
                "pow state '{}' missing",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    fn write_u64(&self, ctx: &mut Context<'_>, key: &[u8], value: u64) -> TxResult<()> {
        let bytes = Format::Binary.encode(&value)?;
        ctx.kv_store(&self.key)?.set(key, bytes);
        Ok(())
    }

    pub fn last_difficulty(&self, ctx: &mut Context<'_>) -> TxResult<u64> {
        self.read_u64(ctx, LAST_DIFFICULTY_KEY)
    }

    pub fn set_last_difficulty(&self, ctx: &mut Context<'_>, difficulty: u64) -> TxResult<()> {
        self.write_u64(ctx, LAST_DIFFICULTY_KEY, difficulty)
    }

    pub fn last_count(&self, ctx: &mut Context<'_>) -> TxResult<u64> {
        self.read_u64(ctx, LAST_COUNT_KEY)
    }

    pub fn set_last_count(&self, ctx: &mut Context<'_>, count: u64) -> TxResult<()> {
        self.write_u64(ctx, LAST_COUNT_KEY, count)
    }

    /// Checks that `(difficulty, count)` is the next step. Returns it.
    pub fn check_valid(&self, ctx: &mut Context<'_>, difficulty: u64, count: u64) -> TxResult<(u64, u64)> {
        let next_difficulty = self.last_difficulty(ctx)?.saturating_add(1);
        let next_count = self.last_count(ctx)?.saturating_add(1);
        if count != next_count {
            return Err(TxError::InvalidMsg(format!(
                "invalid count: expected {next_count}, got {count}"
            )));
        }
        if difficulty != next_difficulty {
            return Err(TxError::InvalidMsg(format!(
                "invalid difficulty: expected {next_difficulty}, got {difficulty}"
            )));
        }
        Ok((next_difficulty, next_count))
    }

    /// Pays the reward and records the new difficulty and count.
    pub fn apply_valid(
        &self,
        ctx: &mut Context<'_>,
        sender: &Address,
        difficulty: u64,
        count: u64,
    ) -> TxResult<()> {
        let reward = Coins::new(vec![Coin::new(
            self.config.denomination.as_str(),
            self.config.reward,
        )])?;
        self.bank.add_coins(ctx, sender, &reward)?;
        self.set_last_difficulty(ctx, difficulty)?;
        self.set_last_count(ctx, count)?;
        info!(%sender, difficulty, count, "block mined");
        Ok(())
    }
}

impl GenesisModule for PowKeeper {
    const NAME: &'static str = MODULE_NAME;
    type State = PowGenesis;

    fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &PowGenesis) -> GenesisResult<()> {
        if genesis.difficulty == 0 {
            return Err(GenesisError::ModuleRejected {
                module: MODULE_NAME,
                reason: "difficulty must be positive".into(),
            });
        }
        self.set_last_difficulty(ctx, genesis.difficulty)
            .and_then(|()| self.set_last_count(ctx, genesis.count))
            .map_err(GenesisError::module(MODULE_NAME))
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<PowGenesis> {
        let difficulty = self
            .last_difficulty(ctx)
            .map_err(GenesisError::module(MODULE_NAME))?;
        let count = self
            .last_count(ctx)
            .map_err(GenesisError::module(MODULE_NAME))?;
        Ok(PowGenesis { difficulty, count })
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct PowHandler {
    keeper: PowKeeper,
}

impl PowHandler {
    pub fn new(keeper: PowKeeper) -> Self {
        Self { keeper }
    }
}

impl Handler for PowHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        let Msg::Mine(mine) = msg else {
            return Err(unrecognized(ROUTE_POW, msg));
        };
        let (difficulty, count) = self.keeper.check_valid(ctx, mine.difficulty, mine.count)?;
        self.keeper.apply_valid(ctx, &mine.sender, difficulty, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestEnv;

    fn miner() -> Address {
        Address::from_pub_key(b"miner")
    }

    fn with_genesis(difficulty: u64, count: u64) -> TestEnv {
        let mut env = TestEnv::new();
        env.apply(|ctx, keepers| {
            keepers
                .pow
                .init_genesis(ctx, &PowGenesis { difficulty, count })
                .unwrap()
        });
        env
    }

    #[test]
    fn mined_proof_validates() {
        let msg = MsgMine::mine(miner(), 3, 1);
        msg.validate_basic().unwrap();

        let mut forged = msg.clone();
        forged.nonce += 1;
        assert!(forged.validate_basic().is_err());
    }

    #[test]
    fn handler_rewards_and_advances() {
        let env = with_genesis(1, 0);
        let mut ctx = env.ctx();
        let handler = PowHandler::new(env.keepers.pow.clone());

        handler
            .handle(&mut ctx, &Msg::Mine(MsgMine::mine(miner(), 2, 1)))
            .unwrap();
        assert_eq!(env.keepers.pow.last_difficulty(&mut ctx).unwrap(), 2);
        assert_eq!(env.keepers.pow.last_count(&mut ctx).unwrap(), 1);
        assert_eq!(
            env.keepers.bank.get_coins(&mut ctx, &miner()).unwrap(),
            Coins::single("pow", 1)
        );
    }

    #[test]
    fn replayed_count_is_rejected() {
        let env = with_genesis(1, 0);
        let mut ctx = env.ctx();
        let handler = PowHandler::new(env.keepers.pow.clone());
        let msg = Msg::Mine(MsgMine::mine(miner(), 2, 1));
        handler.handle(&mut ctx, &msg).unwrap();
        assert!(matches!(
            handler.handle(&mut ctx, &msg),
            Err(TxError::InvalidMsg(_))
        ));
    }

    #[test]
    fn zero_difficulty_genesis_is_rejected() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let err = env
            .keepers
            .pow
            .init_genesis(&mut ctx, &PowGenesis { difficulty: 0, count: 0 })
            .unwrap_err();
        assert!(matches!(err, GenesisError::ModuleRejected { module: "pow", .. }));
    }

    #[test]
    fn export_mirrors_genesis() {
        let env = with_genesis(5, 9);
        let mut ctx = env.ctx();
        assert_eq!(
            env.keepers.pow.export_genesis(&mut ctx).unwrap(),
            PowGenesis { difficulty: 5, count: 9 }
        );
    }
}
