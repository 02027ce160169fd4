//! # Error Taxonomy
//!
//! The state machine distinguishes two kinds of failure and never mixes
//! them up:
//!
//! - **Halting errors** ([`AppError`] and everything it wraps). Duplicate
//!   registrations, writes after sealing, malformed genesis documents, and
//!   persistence failures. There is no safe way to continue a replicated
//!   ledger after one of these, so they travel up to the node binary, which
//!   exits.
//! - **Rejections** ([`TxError`]). Unknown routes, ante failures, and
//!   domain-rule violations such as insufficient funds. The offending
//!   transaction is dropped with a numeric code, its writes are discarded,
//!   and the chain moves on to the next transaction.
//!
//! [`CodecError::UnknownType`] sits in between: it always aborts whatever
//! operation tried to decode the data. Inside a transaction that means a
//! rejection; inside genesis it means a halt.

use thiserror::Error;

use crate::genesis::GenesisPhase;
use crate::types::{Address, Coins};

// ---------------------------------------------------------------------------
// Configuration Errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling the application. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A store name was declared twice.
    #[error("store key '{0}' is already declared")]
    DuplicateStoreKey(String),

    /// The same store key was handed to `mount` twice.
    #[error("store '{0}' is already mounted")]
    DuplicateMount(String),

    /// A route name was registered twice.
    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),

    /// Route names must be non-empty and alphanumeric.
    #[error("route name '{0}' must be non-empty and alphanumeric")]
    InvalidRouteName(String),

    /// An interface category was registered twice.
    #[error("interface '{0}' is already registered")]
    DuplicateInterface(String),

    /// A concrete type was registered against an unknown interface.
    #[error("interface '{0}' is not registered")]
    UnknownInterface(String),

    /// A type tag was registered twice.
    #[error("type tag '{0}' is already registered")]
    DuplicateTypeTag(String),

    /// The named registry has been sealed and accepts no more entries.
    #[error("{0} is sealed")]
    Sealed(&'static str),
}

// ---------------------------------------------------------------------------
// Store Errors
// ---------------------------------------------------------------------------

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// A keeper asked for a store that was never mounted.
    #[error("store '{0}' is not mounted")]
    NotMounted(String),

    /// Commit metadata on disk could not be parsed.
    #[error("corrupt store metadata: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Codec Errors
// ---------------------------------------------------------------------------

/// Errors from the type registry and the wire/storage encoders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The data carries a tag that is not registered under the expected
    /// interface. Never defaulted, never skipped.
    #[error("unknown type '{tag}' for interface {interface}")]
    UnknownType {
        /// Interface category the caller asked for.
        interface: String,
        /// Tag found in the data.
        tag: String,
    },

    /// A value tried to encode under a tag the registry does not know.
    #[error("type '{0}' is not registered")]
    Unregistered(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Transaction Errors
// ---------------------------------------------------------------------------

/// Transaction-level failures. The transaction is rejected, nothing it
/// wrote is kept, and processing continues.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid sequence: expected {expected}, got {got}")]
    InvalidSequence { expected: u64, got: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("insufficient funds: {address} has {available}, needs {required}")]
    InsufficientFunds {
        address: Address,
        available: Coins,
        required: Coins,
    },

    #[error("no such route: {0}")]
    UnknownRoute(String),

    /// The route exists but its handler does not understand the message.
    #[error("unrecognized message for route {route}: {tag}")]
    UnknownRequest { route: String, tag: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPubKey(String),

    #[error("unknown address: {0}")]
    UnknownAddress(Address),

    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    #[error("memo too large: {actual} characters, limit {limit}")]
    MemoTooLarge { limit: u64, actual: u64 },

    #[error("insufficient fee: {0}")]
    InsufficientFee(String),

    #[error("too many signatures: {actual}, limit {limit}")]
    TooManySignatures { limit: u64, actual: u64 },

    /// Module-specific validation failure.
    #[error("invalid message: {0}")]
    InvalidMsg(String),
}

impl TxError {
    /// Numeric result code reported back to the consensus collaborator.
    /// Zero is reserved for success.
    pub fn code(&self) -> u32 {
        match self {
            TxError::Internal(_) | TxError::Store(_) => 1,
            TxError::Codec(_) => 2,
            TxError::InvalidSequence { .. } => 3,
            TxError::Unauthorized(_) => 4,
            TxError::InsufficientFunds { .. } => 5,
            TxError::UnknownRoute(_) | TxError::UnknownRequest { .. } => 6,
            TxError::InvalidAddress(_) => 7,
            TxError::InvalidPubKey(_) => 8,
            TxError::UnknownAddress(_) => 9,
            TxError::InvalidCoins(_) => 11,
            TxError::MemoTooLarge { .. } => 13,
            TxError::InsufficientFee(_) => 14,
            TxError::TooManySignatures { .. } => 15,
            TxError::InvalidMsg(_) => 16,
        }
    }
}

pub type TxResult<T> = Result<T, TxError>;

// ---------------------------------------------------------------------------
// Genesis Errors
// ---------------------------------------------------------------------------

/// Errors raised while initializing from, or exporting to, a genesis
/// document. Always fatal.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// The document is not valid JSON or is missing a required section.
    #[error("malformed genesis document: {0}")]
    Parse(String),

    /// A genesis operation was attempted in the wrong lifecycle phase.
    #[error("genesis controller is {actual:?}, expected {expected:?}")]
    InvalidPhase {
        expected: GenesisPhase,
        actual: GenesisPhase,
    },

    /// A module refused its initial state.
    #[error("module {module} rejected its genesis state: {reason}")]
    ModuleRejected { module: &'static str, reason: String },

    /// A keeper operation failed while loading or exporting a module.
    #[error("module {module} failed: {source}")]
    Module {
        module: &'static str,
        #[source]
        source: TxError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl GenesisError {
    /// Adapter for `map_err` on keeper calls made on behalf of `module`.
    pub fn module(module: &'static str) -> impl FnOnce(TxError) -> GenesisError {
        move |source| GenesisError::Module { module, source }
    }
}

pub type GenesisResult<T> = Result<T, GenesisError>;

// ---------------------------------------------------------------------------
// Application Errors
// ---------------------------------------------------------------------------

/// Umbrella error for the composed application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("genesis error: {0}")]
    Genesis(#[from] GenesisError),

    /// A single transaction failed on a path where the caller asked for
    /// strict execution.
    #[error("transaction rejected: {0}")]
    Tx(#[from] TxError),
}

impl AppError {
    /// Whether the process must stop. Only transaction rejections are
    /// survivable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Tx(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_error_codes_are_nonzero() {
        let errors = [
            TxError::Internal("x".into()),
            TxError::UnknownRoute("nope".into()),
            TxError::InvalidSequence { expected: 1, got: 2 },
            TxError::InvalidMsg("bad".into()),
        ];
        assert!(errors.iter().all(|e| e.code() != 0));
    }

    #[test]
    fn only_tx_errors_are_survivable() {
        assert!(!AppError::Tx(TxError::UnknownRoute("x".into())).is_fatal());
        assert!(AppError::Config(ConfigError::Sealed("router")).is_fatal());
        assert!(AppError::Genesis(GenesisError::Parse("eof".into())).is_fatal());
    }

    #[test]
    fn unknown_type_message_names_the_tag() {
        let err = CodecError::UnknownType {
            interface: "Msg".into(),
            tag: "evil/Msg".into(),
        };
        assert!(err.to_string().contains("evil/Msg"));
    }
}
