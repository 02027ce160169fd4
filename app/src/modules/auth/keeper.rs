use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::account::Account;
use crate::codec::{Codec, Format};
use crate::config::{DEFAULT_MAX_MEMO_CHARACTERS, DEFAULT_TX_SIG_LIMIT};
use crate::context::Context;
use crate::error::TxResult;
use crate::modules::params::Subspace;
use crate::store::{KvStore, StoreKey};
use crate::types::{Address, Coins};

const ADDRESS_PREFIX: &[u8] = b"addr:";
const GLOBAL_ACCOUNT_NUMBER_KEY: &[u8] = b"globalAccountNumber";

const KEY_MAX_MEMO_CHARACTERS: &str = "max_memo_characters";
const KEY_TX_SIG_LIMIT: &str = "tx_sig_limit";

fn address_key(addr: &Address) -> Vec<u8> {
    let mut key = ADDRESS_PREFIX.to_vec();
    key.extend_from_slice(addr.as_bytes());
    key
}

/// Auth module parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            max_memo_characters: DEFAULT_MAX_MEMO_CHARACTERS,
            tx_sig_limit: DEFAULT_TX_SIG_LIMIT,
        }
    }
}

/// Sole owner of the account store.
#[derive(Clone, Debug)]
pub struct AccountKeeper {
    key: StoreKey,
    codec: Arc<Codec>,
    params: Subspace,
}

impl AccountKeeper {
    pub fn new(codec: Arc<Codec>, key: StoreKey, params: Subspace) -> Self {
        Self { key, codec, params }
    }

    /// A fresh account for `addr` with the next account number. Not
    /// stored until [`AccountKeeper::set_account`].
    pub fn new_account_with_address(&self, ctx: &mut Context<'_>, addr: Address) -> TxResult<Account> {
        let mut acc = Account::proto(addr);
        acc.set_account_number(self.next_account_number(ctx)?);
        Ok(acc)
    }

    pub fn get_account(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Option<Account>> {
        let store = ctx.kv_store(&self.key)?;
        match store.get(&address_key(addr))? {
            Some(bytes) => Ok(Some(self.codec.unmarshal_binary(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_account(&self, ctx: &mut Context<'_>, acc: &Account) -> TxResult<()> {
        let bytes = self.codec.marshal_binary(acc)?;
        ctx.kv_store(&self.key)?.set(&address_key(&acc.address()), bytes);
        Ok(())
    }

    pub fn remove_account(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<()> {
        ctx.kv_store(&self.key)?.delete(&address_key(addr));
        Ok(())
    }

    /// Visits every account in address order until `visit` returns `true`.
    pub fn iterate_accounts<F>(&self, ctx: &mut Context<'_>, mut visit: F) -> TxResult<()>
    where
        F: FnMut(Account) -> bool,
    {
        let store = ctx.kv_store(&self.key)?;
        for entry in store.prefix_iter(ADDRESS_PREFIX) {
            let (_, bytes) = entry?;
            let acc: Account = self.codec.unmarshal_binary(&bytes)?;
            if visit(acc) {
                break;
            }
        }
        Ok(())
    }

    /// Balance of `addr`; empty for unknown accounts.
    pub fn get_coins(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Coins> {
        Ok(self
            .get_account(ctx, addr)?
            .map(|acc| acc.coins().clone())
            .unwrap_or_default())
    }

    /// Overwrites the balance of `addr`, creating the account if needed.
    pub fn set_coins(&self, ctx: &mut Context<'_>, addr: &Address, coins: Coins) -> TxResult<()> {
        let mut acc = match self.get_account(ctx, addr)? {
            Some(acc) => acc,
            None => self.new_account_with_address(ctx, *addr)?,
        };
        acc.set_coins(coins);
        self.set_account(ctx, &acc)
    }

    pub fn get_sequence(&self, ctx: &mut Context<'_>, addr: &Address) -> TxResult<Option<u64>> {
        Ok(self.get_account(ctx, addr)?.map(|acc| acc.sequence()))
    }

    fn next_account_number(&self, ctx: &mut Context<'_>) -> TxResult<u64> {
        let mut store = ctx.kv_store(&self.key)?;
        let next = match store.get(GLOBAL_ACCOUNT_NUMBER_KEY)? {
            Some(bytes) => Format::Binary.decode::<u64>(&bytes)?,
            None => 0,
        };
        store.set(GLOBAL_ACCOUNT_NUMBER_KEY, Format::Binary.encode(&(next + 1))?);
        Ok(next)
    }

    // -- Params -------------------------------------------------------------

    /// Current auth params. Unset values fall back to their defaults.
    pub fn params(&self, ctx: &mut Context<'_>) -> TxResult<AuthParams> {
        let defaults = AuthParams::default();
        Ok(AuthParams {
            max_memo_characters: self
                .params
                .get(ctx, KEY_MAX_MEMO_CHARACTERS)?
                .unwrap_or(defaults.max_memo_characters),
            tx_sig_limit: self
                .params
                .get(ctx, KEY_TX_SIG_LIMIT)?
                .unwrap_or(defaults.tx_sig_limit),
        })
    }

    pub fn set_params(&self, ctx: &mut Context<'_>, params: &AuthParams) -> TxResult<()> {
        self.params
            .set(ctx, KEY_MAX_MEMO_CHARACTERS, &params.max_memo_characters)?;
        self.params.set(ctx, KEY_TX_SIG_LIMIT, &params.tx_sig_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestEnv;

    #[test]
    fn account_numbers_are_sequential() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let ak = &env.keepers.account;
        let a = ak.new_account_with_address(&mut ctx, Address::from_pub_key(b"a")).unwrap();
        let b = ak.new_account_with_address(&mut ctx, Address::from_pub_key(b"b")).unwrap();
        assert_eq!(a.account_number(), 0);
        assert_eq!(b.account_number(), 1);
    }

    #[test]
    fn set_get_remove() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let ak = &env.keepers.account;
        let addr = Address::from_pub_key(b"a");
        assert!(ak.get_account(&mut ctx, &addr).unwrap().is_none());

        ak.set_coins(&mut ctx, &addr, Coins::single("pow", 9)).unwrap();
        assert_eq!(ak.get_coins(&mut ctx, &addr).unwrap(), Coins::single("pow", 9));
        assert_eq!(ak.get_sequence(&mut ctx, &addr).unwrap(), Some(0));

        ak.remove_account(&mut ctx, &addr).unwrap();
        assert!(ak.get_coins(&mut ctx, &addr).unwrap().is_empty());
    }

    #[test]
    fn iteration_is_in_address_order_and_stoppable() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let ak = &env.keepers.account;
        for seed in [b"x", b"y", b"z"] {
            ak.set_coins(&mut ctx, &Address::from_pub_key(seed), Coins::single("pow", 1))
                .unwrap();
        }
        let mut seen = Vec::new();
        ak.iterate_accounts(&mut ctx, |acc| {
            seen.push(acc.address());
            false
        })
        .unwrap();
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(seen.len(), 3);

        let mut count = 0;
        ak.iterate_accounts(&mut ctx, |_| {
            count += 1;
            true
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn params_default_until_set() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let ak = &env.keepers.account;
        assert_eq!(ak.params(&mut ctx).unwrap(), AuthParams::default());
        let custom = AuthParams {
            max_memo_characters: 10,
            tx_sig_limit: 2,
        };
        ak.set_params(&mut ctx, &custom).unwrap();
        assert_eq!(ak.params(&mut ctx).unwrap(), custom);
    }
}
