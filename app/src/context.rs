//! Execution context handed to keepers, handlers, and the ante handler.
//!
//! A [`Context`] borrows the committed [`MultiStore`] read-only and keeps
//! its own write overlay per store. Nothing a context writes reaches the
//! database until the application calls [`Context::into_cache`] and
//! flushes the result, which it only does once the whole operation has
//! succeeded.

use crate::error::StoreResult;
use crate::store::kv::{CacheKvStore, StoreCache};
use crate::store::{MultiStore, StoreKey};
use crate::types::Header;

/// Why a context was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Mempool admission. Writes are always discarded.
    Check,
    /// Block execution. Writes are kept on success.
    Deliver,
    /// Genesis initialization.
    InitChain,
    /// Read-only snapshot for export and queries.
    Query,
}

pub struct Context<'a> {
    store: &'a MultiStore,
    cache: StoreCache,
    header: Header,
    mode: ExecMode,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a MultiStore, header: Header, mode: ExecMode) -> Self {
        Self {
            store,
            cache: StoreCache::new(),
            header,
            mode,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Read/write view of the store named by `key`.
    pub fn kv_store(&mut self, key: &StoreKey) -> StoreResult<CacheKvStore<'_>> {
        let parent = self.store.parent(key)?;
        let writes = self.cache.entry(key.name().to_string()).or_default();
        Ok(CacheKvStore::new(parent, writes))
    }

    /// Whether anything has been written through this context.
    pub fn is_dirty(&self) -> bool {
        self.cache.values().any(|writes| !writes.is_empty())
    }

    /// Consumes the context, yielding its pending writes.
    pub(crate) fn into_cache(self) -> StoreCache {
        self.cache
    }
}
