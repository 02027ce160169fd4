use super::MODULE_NAME;
use crate::codec::Format;
use crate::context::Context;
use crate::error::{GenesisError, GenesisResult, TxError, TxResult};
use crate::genesis::GenesisModule;
use crate::store::{KvStore, StoreKey};
use crate::types::Coins;

const COLLECTED_FEES_KEY: &[u8] = b"collectedFees";

/// Accumulates the fees paid by transactions in the `fee` store.
#[derive(Clone, Debug)]
pub struct FeeCollectionKeeper {
    key: StoreKey,
}

impl FeeCollectionKeeper {
    pub fn new(key: StoreKey) -> Self {
        Self { key }
    }

    pub fn get_collected_fees(&self, ctx: &mut Context<'_>) -> TxResult<Coins> {
        match ctx.kv_store(&self.key)?.get(COLLECTED_FEES_KEY)? {
            Some(bytes) => Ok(Format::Binary.decode(&bytes)?),
            None => Ok(Coins::empty()),
        }
    }

    pub fn add_collected_fees(&self, ctx: &mut Context<'_>, fees: &Coins) -> TxResult<Coins> {
        let total = self
            .get_collected_fees(ctx)?
            .checked_add(fees)
            .ok_or_else(|| TxError::InvalidCoins("collected fees overflow".into()))?;
        self.set_collected_fees(ctx, &total)?;
        Ok(total)
    }

    pub fn clear_collected_fees(&self, ctx: &mut Context<'_>) -> TxResult<()> {
        self.set_collected_fees(ctx, &Coins::empty())
    }

    fn set_collected_fees(&self, ctx: &mut Context<'_>, fees: &Coins) -> TxResult<()> {
        let bytes = Format::Binary.encode(fees)?;
        ctx.kv_store(&self.key)?.set(COLLECTED_FEES_KEY, bytes);
        Ok(())
    }
}

/// Fees collected but not yet distributed are part of the ledger, so
/// they travel with the `auth` genesis section.
impl GenesisModule for FeeCollectionKeeper {
    const NAME: &'static str = MODULE_NAME;
    type State = Coins;

    fn init_genesis(&self, ctx: &mut Context<'_>, fees: &Coins) -> GenesisResult<()> {
        if fees.is_empty() {
            return Ok(());
        }
        self.set_collected_fees(ctx, fees)
            .map_err(GenesisError::module(MODULE_NAME))
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<Coins> {
        self.get_collected_fees(ctx)
            .map_err(GenesisError::module(MODULE_NAME))
    }
}
