//! # Store Module
//!
//! Named, isolated key-value namespaces and the persistence layer they are
//! mounted into.
//!
//! ```text
//! key.rs    : StoreKey / StoreRegistry: declare names once, then seal
//! kv.rs     : KvStore trait, cache overlays, prefix views
//! multi.rs  : MultiStore: sled trees, transient maps, commit + app hash
//! ```
//!
//! A keeper reaches its store only through the [`StoreKey`] it was built
//! with, via [`crate::context::Context::kv_store`]. There is no other path
//! from module code to the database.

pub mod key;
pub mod kv;
pub mod multi;

pub use key::{StoreKey, StoreKind, StoreRegistry};
pub use kv::{CacheKvStore, KvIter, KvPair, KvStore, PrefixStore};
pub use multi::MultiStore;
