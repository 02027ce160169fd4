//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::Utc;

use crate::app::{make_codec, AppKeys, Keepers};
use crate::context::{Context, ExecMode};
use crate::modules::auth::StdAnteHandler;
use crate::store::{MultiStore, StoreRegistry};
use crate::tx::StdSignature;
use crate::types::{Address, Coins, Header};

/// Every store mounted on a temporary database, plus the keepers over it.
pub(crate) struct TestEnv {
    pub store: MultiStore,
    pub keepers: Keepers,
}

impl TestEnv {
    pub fn new() -> Self {
        let codec = Arc::new(make_codec().unwrap());
        let mut registry = StoreRegistry::new();
        let keys = AppKeys::declare(&mut registry).unwrap();
        let mut store = MultiStore::open_temporary().unwrap();
        store.mount(registry.keys()).unwrap();
        store.load_latest_version(&keys.main).unwrap();
        let keepers = Keepers::new(codec, &keys);
        Self { store, keepers }
    }

    /// A deliver-mode context over committed state.
    pub fn ctx(&self) -> Context<'_> {
        Context::new(&self.store, Header::new("test-chain", 1, Utc::now()), ExecMode::Deliver)
    }

    /// Runs `f` in a fresh context and writes its changes.
    pub fn apply<T>(&mut self, f: impl FnOnce(&mut Context<'_>, &Keepers) -> T) -> T {
        let mut ctx = Context::new(
            &self.store,
            Header::new("test-chain", 1, Utc::now()),
            ExecMode::Deliver,
        );
        let out = f(&mut ctx, &self.keepers);
        let cache = ctx.into_cache();
        self.store.write(cache).unwrap();
        out
    }

    /// Creates the account controlled by `seed` with `coins`.
    pub fn fund(&mut self, seed: &[u8], coins: Coins) {
        let addr = Address::from_pub_key(seed);
        self.apply(|ctx, keepers| keepers.account.set_coins(ctx, &addr, coins).unwrap());
    }

    pub fn ante(&self) -> StdAnteHandler {
        StdAnteHandler::new(self.keepers.account.clone(), self.keepers.fee.clone())
    }
}

/// A signature by the key `seed` that passes the standard ante handler.
pub(crate) fn sign(seed: &[u8], account_number: u64, sequence: u64) -> StdSignature {
    StdSignature {
        pub_key: hex::encode(seed),
        signature: hex::encode(b"signed"),
        account_number,
        sequence,
    }
}
