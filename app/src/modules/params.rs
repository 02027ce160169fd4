//! # Params Keeper
//!
//! Module parameters live in one shared `params` store, partitioned by
//! subspace name (`auth/max_memo_characters`, ...). A module never opens
//! the params store itself; it is handed a [`Subspace`] at construction
//! and reads and writes through it.
//!
//! Every write also marks the key in the transient store, so code running
//! later in the same block can ask whether a parameter just changed. The
//! marks vanish at commit.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Format;
use crate::context::Context;
use crate::error::TxResult;
use crate::store::{KvStore, PrefixStore, StoreKey};

/// Owner of the `params` and `transient_params` stores.
#[derive(Clone, Debug)]
pub struct ParamsKeeper {
    key: StoreKey,
    tkey: StoreKey,
}

impl ParamsKeeper {
    pub fn new(key: StoreKey, tkey: StoreKey) -> Self {
        Self { key, tkey }
    }

    /// Hands out the partition for one module.
    pub fn subspace(&self, name: &'static str) -> Subspace {
        Subspace {
            name,
            key: self.key.clone(),
            tkey: self.tkey.clone(),
        }
    }
}

/// One module's partition of the params store.
#[derive(Clone, Debug)]
pub struct Subspace {
    name: &'static str,
    key: StoreKey,
    tkey: StoreKey,
}

impl Subspace {
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn prefix(&self) -> Vec<u8> {
        format!("{}/", self.name).into_bytes()
    }

    /// Reads a JSON-encoded parameter. `None` when never set.
    pub fn get<T: DeserializeOwned>(&self, ctx: &mut Context<'_>, key: &str) -> TxResult<Option<T>> {
        let prefix = self.prefix();
        let store = PrefixStore::new(ctx.kv_store(&self.key)?, &prefix);
        match store.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Format::Json.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, ctx: &mut Context<'_>, key: &str, value: &T) -> TxResult<()> {
        let prefix = self.prefix();
        let bytes = Format::Json.encode(value)?;
        PrefixStore::new(ctx.kv_store(&self.key)?, &prefix).set(key.as_bytes(), bytes);
        PrefixStore::new(ctx.kv_store(&self.tkey)?, &prefix).set(key.as_bytes(), Vec::new());
        Ok(())
    }

    /// Whether `key` was written since the last commit.
    pub fn modified(&self, ctx: &mut Context<'_>, key: &str) -> TxResult<bool> {
        let prefix = self.prefix();
        Ok(PrefixStore::new(ctx.kv_store(&self.tkey)?, &prefix).has(key.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::TestEnv;

    #[test]
    fn subspaces_do_not_collide() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let auth = env.keepers.params.subspace("auth");
        let other = env.keepers.params.subspace("other");

        auth.set(&mut ctx, "limit", &7u64).unwrap();
        other.set(&mut ctx, "limit", &9u64).unwrap();
        assert_eq!(auth.get::<u64>(&mut ctx, "limit").unwrap(), Some(7));
        assert_eq!(other.get::<u64>(&mut ctx, "limit").unwrap(), Some(9));
        assert_eq!(auth.get::<u64>(&mut ctx, "missing").unwrap(), None);
    }

    #[test]
    fn modification_marks_reset_on_commit() {
        let mut env = TestEnv::new();
        let auth = env.keepers.params.subspace("auth");
        env.apply(|ctx, _| {
            assert!(!auth.modified(ctx, "limit").unwrap());
            auth.set(ctx, "limit", &7u64).unwrap();
            assert!(auth.modified(ctx, "limit").unwrap());
        });
        env.store.commit().unwrap();

        let mut ctx = env.ctx();
        assert!(!auth.modified(&mut ctx, "limit").unwrap());
        assert_eq!(auth.get::<u64>(&mut ctx, "limit").unwrap(), Some(7));
    }
}
