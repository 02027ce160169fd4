// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # XpxCosmos: Application Core
//!
//! The module-composition and genesis layer of a small Cosmos-style
//! blockchain application. Independent modules (accounts, bank,
//! proof-of-work, the cool quiz, inter-chain transfers, simple staking)
//! are assembled into one deterministic state machine over isolated
//! stores, then carried through chain initialization and state export.
//!
//! ## Architecture
//!
//! - **store**: Store keys, isolated key-value views, and the sled-backed
//!   multistore with versioned commits.
//! - **codec**: Tagged polymorphic encoding with a sealed type registry.
//! - **modules**: Keepers, messages, and handlers, one module per store.
//! - **router**: Route name to handler dispatch.
//! - **genesis**: Genesis document, lifecycle, and export.
//! - **app**: Composition, the transaction pipeline, and commit.
//! - **config**: Store names, type tags, routes, and module defaults.
//!
//! ## Invariants
//!
//! 1. A store is reachable only through the key its module was given.
//! 2. Registries are sealed before the first transaction.
//! 3. A transaction commits all of its writes or none of them.
//! 4. `export(init(doc))` reproduces `doc`.

pub mod app;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod genesis;
pub mod modules;
pub mod router;
pub mod store;
pub mod tx;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use app::XpxApp;
pub use error::{AppError, AppResult};
