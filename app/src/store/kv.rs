//! Key-value store views handed to keepers.
//!
//! Keepers never touch sled directly. They get a [`CacheKvStore`]: a read
//! view of one store plus a private write overlay. Writes only land in the
//! overlay, which the application flushes after a transaction succeeds or
//! throws away after it fails.
//!
//! ```text
//! read:  tx overlay -> block pending writes -> sled tree
//! ```
//!
//! Flushed overlays accumulate in the block's pending writes and reach
//! sled only on commit.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::error::{StoreError, StoreResult};

/// One key/value entry.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Lazy, ascending iteration over a store's entries.
pub type KvIter<'a> = Box<dyn Iterator<Item = StoreResult<KvPair>> + 'a>;

/// Pending writes for one store. `None` marks a deletion.
pub(crate) type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Pending writes for every store touched in a context, keyed by store name.
pub(crate) type StoreCache = BTreeMap<String, WriteSet>;

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Read/write access to one isolated namespace.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// Entries whose key starts with `prefix`, in ascending key order.
    /// Each call starts a fresh iteration.
    fn prefix_iter(&self, prefix: &[u8]) -> KvIter<'_>;
}

// ---------------------------------------------------------------------------
// Block-level stores
// ---------------------------------------------------------------------------

/// Read-only view of one mounted store as of the current block: committed
/// sled data shadowed by the block's not-yet-committed writes.
#[derive(Clone, Copy)]
pub(crate) enum ParentStore<'a> {
    Persistent {
        tree: &'a sled::Tree,
        pending: Option<&'a WriteSet>,
    },
    Transient(&'a BTreeMap<Vec<u8>, Vec<u8>>),
}

impl<'a> ParentStore<'a> {
    pub(crate) fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match *self {
            ParentStore::Persistent { tree, pending } => {
                if let Some(value) = pending.and_then(|p| p.get(key)) {
                    return Ok(value.clone());
                }
                Ok(tree.get(key)?.map(|v| v.to_vec()))
            }
            ParentStore::Transient(map) => Ok(map.get(key).cloned()),
        }
    }

    pub(crate) fn prefix_iter(&self, prefix: &[u8]) -> KvIter<'a> {
        match *self {
            ParentStore::Persistent { tree, pending } => {
                let committed: KvIter<'a> = Box::new(tree.scan_prefix(prefix).map(|entry| {
                    entry
                        .map(|(k, v)| (k.to_vec(), v.to_vec()))
                        .map_err(StoreError::from)
                }));
                match pending {
                    Some(writes) => Box::new(MergeIter {
                        parent: committed.peekable(),
                        overlay: overlay_range(writes, prefix).peekable(),
                    }),
                    None => committed,
                }
            }
            ParentStore::Transient(map) => {
                let prefix = prefix.to_vec();
                Box::new(
                    map.range(prefix.clone()..)
                        .take_while(move |(k, _)| k.starts_with(&prefix))
                        .map(|(k, v)| Ok((k.clone(), v.clone()))),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CacheKvStore
// ---------------------------------------------------------------------------

/// Committed data plus a write overlay.
pub struct CacheKvStore<'a> {
    parent: ParentStore<'a>,
    writes: &'a mut WriteSet,
}

impl<'a> CacheKvStore<'a> {
    pub(crate) fn new(parent: ParentStore<'a>, writes: &'a mut WriteSet) -> Self {
        Self { parent, writes }
    }
}

impl KvStore for CacheKvStore<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key.to_vec(), Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn prefix_iter(&self, prefix: &[u8]) -> KvIter<'_> {
        let parent: KvIter<'_> = self.parent.prefix_iter(prefix);
        Box::new(MergeIter {
            parent: parent.peekable(),
            overlay: overlay_range(self.writes, prefix).peekable(),
        })
    }
}

type OverlayIter<'a> = Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a>;

/// Pending writes under `prefix`, in key order.
fn overlay_range<'a>(writes: &'a WriteSet, prefix: &[u8]) -> OverlayIter<'a> {
    let owned = prefix.to_vec();
    Box::new(
        writes
            .range(owned.clone()..)
            .take_while(move |(k, _)| k.starts_with(&owned)),
    )
}

/// Merges committed entries with the overlay. Overlay entries shadow
/// committed ones with the same key; deletions hide them.
struct MergeIter<'a> {
    parent: Peekable<KvIter<'a>>,
    overlay: Peekable<OverlayIter<'a>>,
}

enum Step {
    Parent,
    Overlay,
    Shadowed,
    Done,
}

impl Iterator for MergeIter<'_> {
    type Item = StoreResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match (self.parent.peek(), self.overlay.peek()) {
                (None, None) => Step::Done,
                (Some(Err(_)), _) | (Some(Ok(_)), None) => Step::Parent,
                (None, Some(_)) => Step::Overlay,
                (Some(Ok((committed, _))), Some((pending, _))) => {
                    match committed.as_slice().cmp(pending.as_slice()) {
                        Ordering::Less => Step::Parent,
                        Ordering::Equal => Step::Shadowed,
                        Ordering::Greater => Step::Overlay,
                    }
                }
            };

            match step {
                Step::Done => return None,
                Step::Parent => return self.parent.next(),
                Step::Shadowed | Step::Overlay => {
                    if matches!(step, Step::Shadowed) {
                        self.parent.next();
                    }
                    let (key, value) = self.overlay.next()?;
                    if let Some(value) = value {
                        return Some(Ok((key.clone(), value.clone())));
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PrefixStore
// ---------------------------------------------------------------------------

/// A view of another store restricted to keys under a fixed prefix. Keys
/// passed in and handed out are relative to the prefix.
pub struct PrefixStore<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S: KvStore> PrefixStore<S> {
    pub fn new(inner: S, prefix: &[u8]) -> Self {
        Self {
            inner,
            prefix: prefix.to_vec(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = self.prefix.clone();
        full.extend_from_slice(key);
        full
    }
}

impl<S: KvStore> KvStore for PrefixStore<S> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        let full = self.full_key(key);
        self.inner.set(&full, value);
    }

    fn delete(&mut self, key: &[u8]) {
        let full = self.full_key(key);
        self.inner.delete(&full);
    }

    fn prefix_iter(&self, prefix: &[u8]) -> KvIter<'_> {
        let strip = self.prefix.len();
        Box::new(
            self.inner
                .prefix_iter(&self.full_key(prefix))
                .map(move |entry| entry.map(|(k, v)| (k[strip..].to_vec(), v))),
        )
    }
}
