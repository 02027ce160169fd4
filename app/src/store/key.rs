//! Store keys and the registry that hands them out.
//!
//! A [`StoreKey`] can only be obtained from [`StoreRegistry::declare`] or
//! [`StoreRegistry::declare_transient`], and the registry refuses a name it
//! has already seen. Each keeper is constructed with the key it owns, which
//! is the only way to reach a store, so no two modules can end up sharing
//! a namespace.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;

/// Name of the sled tree reserved for commit metadata.
pub(crate) const META_TREE: &str = "__xpx_meta";

/// Whether a store survives commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKind {
    /// Backed by a sled tree, included in the app hash.
    Persistent,
    /// In-memory only, wiped on every commit, never hashed.
    Transient,
}

/// Immutable handle naming one isolated store.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    name: Arc<str>,
    kind: StoreKind,
}

impl StoreKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StoreKind::Transient
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({}, {:?})", self.name, self.kind)
    }
}

/// Startup-time registry of store names.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    keys: Vec<StoreKey>,
    sealed: bool,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a persistent store.
    pub fn declare(&mut self, name: &str) -> Result<StoreKey, ConfigError> {
        self.insert(name, StoreKind::Persistent)
    }

    /// Declares a transient store, reset at every commit.
    pub fn declare_transient(&mut self, name: &str) -> Result<StoreKey, ConfigError> {
        self.insert(name, StoreKind::Transient)
    }

    fn insert(&mut self, name: &str, kind: StoreKind) -> Result<StoreKey, ConfigError> {
        if self.sealed {
            return Err(ConfigError::Sealed("store registry"));
        }
        if name == META_TREE || self.keys.iter().any(|k| k.name() == name) {
            return Err(ConfigError::DuplicateStoreKey(name.to_string()));
        }
        let key = StoreKey {
            name: Arc::from(name),
            kind,
        };
        debug!(store = name, ?kind, "store declared");
        self.keys.push(key.clone());
        Ok(key)
    }

    /// All declared keys, in declaration order.
    pub fn keys(&self) -> &[StoreKey] {
        &self.keys
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
