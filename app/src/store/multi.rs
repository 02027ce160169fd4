//! # MultiStore: Mounted Stores over sled
//!
//! The persistence collaborator. Every persistent store key gets its own
//! sled tree; every transient key gets an in-memory map that is wiped on
//! commit. A reserved metadata tree records the last committed version and
//! app hash.
//!
//! Writes flushed between commits are held in memory as the block's
//! pending writes. `commit` applies them to the trees together with the
//! new version and app hash in one sled transaction, so the trees on disk
//! always match the recorded commit.
//!
//! ## Lifecycle
//!
//! ```text
//! open → mount(keys) → load_latest_version(main) → seal
//!      → { write(cache)* → commit }*
//!
//! write(cache) : tx overlay  -> pending (memory)
//! commit       : pending + meta -> sled (one transaction) -> flush
//! ```
//!
//! `mount` only registers names. Trees are opened by
//! `load_latest_version`, which also restores the last [`CommitInfo`].
//! After `seal`, the set of mounted stores is fixed for the life of the
//! process.
//!
//! ## App Hash
//!
//! ```text
//! app_hash = BLAKE3( for store in mount order, persistent only:
//!                      len(name) || name ||
//!                      for (k, v) in store: len(k) || k || len(v) || v )
//! ```
//!
//! Lengths are 8-byte big-endian. Entries are read through the pending
//! writes in key order, so the hash depends only on contents, never on
//! write history.

use std::collections::BTreeMap;
use std::path::Path;

use sled::transaction::{TransactionError, TransactionResult};
use sled::{Batch, Db, Transactional, Tree};
use tracing::{debug, info};

use super::key::{StoreKey, StoreKind, META_TREE};
use super::kv::{ParentStore, StoreCache, WriteSet};
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::types::CommitInfo;

const META_LATEST_VERSION: &[u8] = b"latest_version";
const META_LATEST_APP_HASH: &[u8] = b"latest_app_hash";

/// Mounted stores plus commit bookkeeping.
pub struct MultiStore {
    db: Db,
    meta: Tree,
    mounted: Vec<StoreKey>,
    persistent: BTreeMap<String, Tree>,
    transient: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Persistent writes since the last commit, keyed by store name.
    pending: StoreCache,
    last_commit: CommitInfo,
    sealed: bool,
}

impl MultiStore {
    /// Opens or creates a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop. Meant for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    pub fn from_db(db: Db) -> StoreResult<Self> {
        let meta = db.open_tree(META_TREE)?;
        Ok(Self {
            db,
            meta,
            mounted: Vec::new(),
            persistent: BTreeMap::new(),
            transient: BTreeMap::new(),
            pending: StoreCache::new(),
            last_commit: CommitInfo::default(),
            sealed: false,
        })
    }

    // -- Configuration ------------------------------------------------------

    /// Registers stores with the database. Fails once sealed or if a key
    /// is already mounted; in both cases nothing is mounted.
    pub fn mount(&mut self, keys: &[StoreKey]) -> Result<(), ConfigError> {
        if self.sealed {
            return Err(ConfigError::Sealed("multistore"));
        }
        for (i, key) in keys.iter().enumerate() {
            let repeated = keys[..i].iter().any(|k| k.name() == key.name());
            if repeated || self.is_mounted(key) {
                return Err(ConfigError::DuplicateMount(key.name().to_string()));
            }
        }
        for key in keys {
            debug!(store = key.name(), kind = ?key.kind(), "store mounted");
            self.mounted.push(key.clone());
        }
        Ok(())
    }

    pub fn is_mounted(&self, key: &StoreKey) -> bool {
        self.mounted.iter().any(|k| k.name() == key.name())
    }

    /// Opens every mounted store and restores the last commit. `main` must
    /// be among the mounted stores.
    pub fn load_latest_version(&mut self, main: &StoreKey) -> StoreResult<CommitInfo> {
        if !self.is_mounted(main) {
            return Err(StoreError::NotMounted(main.name().to_string()));
        }
        for key in &self.mounted {
            match key.kind() {
                StoreKind::Persistent => {
                    let tree = self.db.open_tree(key.name())?;
                    self.persistent.insert(key.name().to_string(), tree);
                }
                StoreKind::Transient => {
                    self.transient.insert(key.name().to_string(), BTreeMap::new());
                }
            }
        }
        self.last_commit = self.read_commit_info()?;
        info!(
            version = self.last_commit.version,
            app_hash = %hex::encode(self.last_commit.app_hash),
            stores = self.mounted.len(),
            "loaded latest version"
        );
        Ok(self.last_commit)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    // -- Reads --------------------------------------------------------------

    /// Current-block view of one store, used as the parent of a cache
    /// overlay.
    pub(crate) fn parent(&self, key: &StoreKey) -> StoreResult<ParentStore<'_>> {
        let missing = || StoreError::NotMounted(key.name().to_string());
        match key.kind() {
            StoreKind::Persistent => self
                .persistent
                .get(key.name())
                .map(|tree| ParentStore::Persistent {
                    tree,
                    pending: self.pending.get(key.name()),
                })
                .ok_or_else(missing),
            StoreKind::Transient => self
                .transient
                .get(key.name())
                .map(ParentStore::Transient)
                .ok_or_else(missing),
        }
    }

    pub fn last_commit(&self) -> CommitInfo {
        self.last_commit
    }

    // -- Writes -------------------------------------------------------------

    /// Merges a context's overlay into the current block. Persistent writes
    /// stay pending until [`MultiStore::commit`]. Nothing is merged if any
    /// store in `cache` is not mounted.
    pub(crate) fn write(&mut self, cache: StoreCache) -> StoreResult<()> {
        if let Some(name) = cache
            .keys()
            .find(|name| !self.persistent.contains_key(*name) && !self.transient.contains_key(*name))
        {
            return Err(StoreError::NotMounted(name.clone()));
        }
        for (name, writes) in cache {
            if writes.is_empty() {
                continue;
            }
            if self.persistent.contains_key(&name) {
                self.pending.entry(name).or_default().extend(writes);
            } else if let Some(map) = self.transient.get_mut(&name) {
                for (key, value) in writes {
                    match value {
                        Some(value) => map.insert(key, value),
                        None => map.remove(&key),
                    };
                }
            } else {
                return Err(StoreError::NotMounted(name));
            }
        }
        Ok(())
    }

    /// Whether any persistent write is waiting for the next commit.
    pub fn has_pending(&self) -> bool {
        self.pending.values().any(|writes| !writes.is_empty())
    }

    /// Seals the current state as the next version: recomputes the app
    /// hash, writes the pending block and the new metadata in one
    /// transaction, flushes to disk, and wipes transient stores.
    pub fn commit(&mut self) -> StoreResult<CommitInfo> {
        let info = CommitInfo {
            version: self.last_commit.version + 1,
            app_hash: self.app_hash()?,
        };

        let mut trees = Vec::with_capacity(self.pending.len() + 1);
        let mut batches = Vec::with_capacity(self.pending.len() + 1);
        for (name, writes) in &self.pending {
            let tree = self
                .persistent
                .get(name)
                .ok_or_else(|| StoreError::NotMounted(name.clone()))?;
            trees.push(tree.clone());
            batches.push(to_batch(writes));
        }
        let mut meta = Batch::default();
        meta.insert(META_LATEST_VERSION, info.version.to_be_bytes().to_vec());
        meta.insert(META_LATEST_APP_HASH, info.app_hash.to_vec());
        trees.push(self.meta.clone());
        batches.push(meta);

        let applied: TransactionResult<(), ()> = trees.as_slice().transaction(|views| {
            for (view, batch) in views.iter().zip(&batches) {
                view.apply_batch(batch)?;
            }
            Ok(())
        });
        applied.map_err(|err| match err {
            TransactionError::Storage(e) => StoreError::Sled(e),
            TransactionError::Abort(()) => StoreError::Corrupted("commit aborted".to_string()),
        })?;
        self.db.flush()?;

        self.pending.clear();
        for map in self.transient.values_mut() {
            map.clear();
        }
        self.last_commit = info;
        info!(
            version = info.version,
            app_hash = %hex::encode(info.app_hash),
            "committed"
        );
        Ok(info)
    }

    /// Hash over every persistent store as of the current block, in mount
    /// order.
    pub fn app_hash(&self) -> StoreResult<[u8; 32]> {
        let mut hasher = blake3::Hasher::new();
        for key in self.mounted.iter().filter(|k| !k.is_transient()) {
            let store = self.parent(key)?;
            update_len_prefixed(&mut hasher, key.name().as_bytes());
            for entry in store.prefix_iter(&[]) {
                let (k, v) = entry?;
                update_len_prefixed(&mut hasher, &k);
                update_len_prefixed(&mut hasher, &v);
            }
        }
        Ok(*hasher.finalize().as_bytes())
    }

    fn read_commit_info(&self) -> StoreResult<CommitInfo> {
        let version = match self.meta.get(META_LATEST_VERSION)? {
            Some(bytes) => u64::from_be_bytes(
                bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Corrupted("invalid version bytes".to_string()))?,
            ),
            None => return Ok(CommitInfo::default()),
        };
        let app_hash = match self.meta.get(META_LATEST_APP_HASH)? {
            Some(bytes) => bytes
                .as_ref()
                .try_into()
                .map_err(|_| StoreError::Corrupted("invalid app hash bytes".to_string()))?,
            None => return Err(StoreError::Corrupted("missing app hash".to_string())),
        };
        Ok(CommitInfo { version, app_hash })
    }
}

fn to_batch(writes: &WriteSet) -> Batch {
    let mut batch = Batch::default();
    for (key, value) in writes {
        match value {
            Some(value) => batch.insert(key.as_slice(), value.as_slice()),
            None => batch.remove(key.as_slice()),
        }
    }
    batch
}

fn update_len_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::key::StoreRegistry;
    use crate::store::kv::{CacheKvStore, KvStore, WriteSet};

    fn setup() -> (MultiStore, StoreKey, StoreKey, StoreKey) {
        let mut registry = StoreRegistry::new();
        let main = registry.declare("main").unwrap();
        let acc = registry.declare("acc").unwrap();
        let tkey = registry.declare_transient("transient").unwrap();
        let mut ms = MultiStore::open_temporary().unwrap();
        ms.mount(registry.keys()).unwrap();
        ms.load_latest_version(&main).unwrap();
        (ms, main, acc, tkey)
    }

    fn write_one(ms: &mut MultiStore, key: &StoreKey, k: &[u8], v: &[u8]) {
        let mut cache = StoreCache::new();
        {
            let writes: &mut WriteSet = cache.entry(key.name().to_string()).or_default();
            let mut store = CacheKvStore::new(ms.parent(key).unwrap(), writes);
            store.set(k, v.to_vec());
        }
        ms.write(cache).unwrap();
    }

    #[test]
    fn load_requires_mounted_main() {
        let mut registry = StoreRegistry::new();
        let main = registry.declare("main").unwrap();
        let mut ms = MultiStore::open_temporary().unwrap();
        assert!(matches!(
            ms.load_latest_version(&main),
            Err(StoreError::NotMounted(_))
        ));
    }

    #[test]
    fn mount_after_seal_fails_and_changes_nothing() {
        let (mut ms, _, _, _) = setup();
        ms.seal();
        let mut other = StoreRegistry::new();
        let late = other.declare("late").unwrap();
        assert_eq!(ms.mount(&[late.clone()]), Err(ConfigError::Sealed("multistore")));
        assert!(!ms.is_mounted(&late));
    }

    #[test]
    fn duplicate_mount_is_rejected_atomically() {
        let (mut ms, main, _, _) = setup();
        let mut other = StoreRegistry::new();
        let fresh = other.declare("fresh").unwrap();
        assert!(ms.mount(&[fresh.clone(), main]).is_err());
        assert!(!ms.is_mounted(&fresh));
    }

    #[test]
    fn commit_bumps_version_and_clears_transient() {
        let (mut ms, _, acc, tkey) = setup();
        write_one(&mut ms, &acc, b"k", b"v");
        write_one(&mut ms, &tkey, b"t", b"1");
        assert!(matches!(ms.parent(&tkey).unwrap(), ParentStore::Transient(m) if m.len() == 1));

        let first = ms.commit().unwrap();
        assert_eq!(first.version, 1);
        assert!(matches!(ms.parent(&tkey).unwrap(), ParentStore::Transient(m) if m.is_empty()));

        let second = ms.commit().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(first.app_hash, second.app_hash);
    }

    #[test]
    fn app_hash_ignores_transient_and_tracks_persistent() {
        let (mut ms, _, acc, tkey) = setup();
        let empty = ms.app_hash().unwrap();
        write_one(&mut ms, &tkey, b"t", b"1");
        assert_eq!(ms.app_hash().unwrap(), empty);
        write_one(&mut ms, &acc, b"k", b"v");
        assert_ne!(ms.app_hash().unwrap(), empty);
    }

    #[test]
    fn writes_wait_for_commit() {
        let (mut ms, _, acc, _) = setup();
        let tree = ms.db.open_tree("acc").unwrap();
        write_one(&mut ms, &acc, b"k", b"v");

        assert!(ms.has_pending());
        assert_eq!(ms.parent(&acc).unwrap().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(tree.get(b"k").unwrap().is_none());

        ms.commit().unwrap();
        assert!(!ms.has_pending());
        assert_eq!(tree.get(b"k").unwrap().unwrap().to_vec(), b"v".to_vec());
    }

    #[test]
    fn write_to_unmounted_store_merges_nothing() {
        let (mut ms, _, acc, _) = setup();
        let mut cache = StoreCache::new();
        cache.entry("acc".to_string()).or_default().insert(b"k".to_vec(), Some(b"v".to_vec()));
        cache.entry("nowhere".to_string()).or_default().insert(b"k".to_vec(), None);
        assert!(matches!(ms.write(cache), Err(StoreError::NotMounted(_))));
        assert_eq!(ms.parent(&acc).unwrap().get(b"k").unwrap(), None);
    }

    #[test]
    fn uncommitted_writes_are_lost_on_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let open = |path: &Path| {
            let mut registry = StoreRegistry::new();
            let main = registry.declare("main").unwrap();
            let mut ms = MultiStore::open(path).unwrap();
            ms.mount(registry.keys()).unwrap();
            ms.load_latest_version(&main).unwrap();
            (ms, main)
        };

        let committed = {
            let (mut ms, main) = open(dir.path());
            write_one(&mut ms, &main, b"a", b"1");
            let info = ms.commit().unwrap();
            write_one(&mut ms, &main, b"a", b"2");
            write_one(&mut ms, &main, b"b", b"3");
            info
        };

        let (ms, main) = open(dir.path());
        assert_eq!(ms.last_commit(), committed);
        assert_eq!(ms.app_hash().unwrap(), committed.app_hash);
        let parent = ms.parent(&main).unwrap();
        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"b").unwrap(), None);
    }

    #[test]
    fn latest_version_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let info = {
            let mut registry = StoreRegistry::new();
            let main = registry.declare("main").unwrap();
            let mut ms = MultiStore::open(dir.path()).unwrap();
            ms.mount(registry.keys()).unwrap();
            ms.load_latest_version(&main).unwrap();
            write_one(&mut ms, &main, b"k", b"v");
            ms.commit().unwrap()
        };

        let mut registry = StoreRegistry::new();
        let main = registry.declare("main").unwrap();
        let mut ms = MultiStore::open(dir.path()).unwrap();
        ms.mount(registry.keys()).unwrap();
        assert_eq!(ms.load_latest_version(&main).unwrap(), info);
    }
}
