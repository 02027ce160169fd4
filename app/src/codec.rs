//! # Codec Registry
//!
//! Polymorphic values (accounts, messages, transactions) are stored and
//! transmitted inside a tagged envelope. The tag is a stable string such
//! as `cosmos-sdk/Send`; the registry maps each tag to exactly one
//! interface category.
//!
//! ```text
//! binary:  bincode(BinaryEnvelope { tag, payload: bincode(concrete) })
//! json:    { "type": tag, "value": <concrete as json> }
//! ```
//!
//! Decoding always looks the tag up first. A tag that is not registered
//! under the requested interface fails with [`CodecError::UnknownType`];
//! nothing is ever decoded into a default. Once [`Codec::seal`] has run,
//! the schema is frozen for the life of the process, so every node
//! running the same binary agrees on it byte for byte.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, CodecResult, ConfigError};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Payload encoding used inside an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// bincode, used for everything written to a store.
    Binary,
    /// JSON, used for transactions and genesis documents.
    Json,
}

impl Format {
    pub fn encode<T: Serialize>(self, value: &T) -> CodecResult<Vec<u8>> {
        match self {
            Format::Binary => {
                bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
            }
            Format::Json => serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string())),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> CodecResult<T> {
        match self {
            Format::Binary => {
                bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            }
            Format::Json => {
                serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// A closed set of concrete shapes sharing one interface category.
///
/// Implementors are enums with one variant per concrete type. The codec
/// handles envelopes and registry checks; the implementor only maps
/// between a variant and its tag.
pub trait Interface: Sized {
    /// Interface category name.
    const NAME: &'static str;

    /// Tag of the concrete shape held by `self`.
    fn type_tag(&self) -> &'static str;

    /// Encodes the concrete value (without envelope).
    fn encode_value(&self, format: Format) -> CodecResult<Vec<u8>>;

    /// Decodes a concrete value given its tag. Tags the implementor does
    /// not know must yield [`CodecError::UnknownType`].
    fn decode_value(tag: &str, format: Format, bytes: &[u8]) -> CodecResult<Self>;
}

/// Error for a tag an [`Interface`] implementor has no variant for.
pub fn unknown_type<T: Interface>(tag: &str) -> CodecError {
    CodecError::UnknownType {
        interface: T::NAME.to_string(),
        tag: tag.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct BinaryEnvelope {
    tag: String,
    payload: Vec<u8>,
}

/// JSON envelope: `{"type": ..., "value": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Registry of interface categories and their concrete type tags.
#[derive(Debug, Default)]
pub struct Codec {
    /// Interface name -> tags registered under it.
    interfaces: BTreeMap<String, BTreeSet<String>>,
    /// Tag -> owning interface. Tags are globally unique.
    concretes: BTreeMap<String, String>,
    sealed: bool,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Registration -------------------------------------------------------

    pub fn register_interface(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.sealed {
            return Err(ConfigError::Sealed("codec"));
        }
        if self.interfaces.contains_key(name) {
            return Err(ConfigError::DuplicateInterface(name.to_string()));
        }
        self.interfaces.insert(name.to_string(), BTreeSet::new());
        Ok(())
    }

    pub fn register_concrete(&mut self, interface: &str, tag: &str) -> Result<(), ConfigError> {
        if self.sealed {
            return Err(ConfigError::Sealed("codec"));
        }
        if self.concretes.contains_key(tag) {
            return Err(ConfigError::DuplicateTypeTag(tag.to_string()));
        }
        let tags = self
            .interfaces
            .get_mut(interface)
            .ok_or_else(|| ConfigError::UnknownInterface(interface.to_string()))?;
        tags.insert(tag.to_string());
        self.concretes.insert(tag.to_string(), interface.to_string());
        debug!(interface, tag, "codec type registered");
        Ok(())
    }

    /// Freezes the schema. Irreversible.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Tags registered under `interface`, in sorted order.
    pub fn tags(&self, interface: &str) -> Vec<&str> {
        self.interfaces
            .get(interface)
            .map(|tags| tags.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Fails with [`CodecError::UnknownType`] unless `tag` is registered
    /// under `interface`.
    pub fn ensure_registered(&self, interface: &str, tag: &str) -> CodecResult<()> {
        match self.concretes.get(tag) {
            Some(owner) if owner == interface => Ok(()),
            _ => Err(CodecError::UnknownType {
                interface: interface.to_string(),
                tag: tag.to_string(),
            }),
        }
    }

    // -- Binary -------------------------------------------------------------

    pub fn marshal_binary<T: Interface>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let tag = value.type_tag();
        self.ensure_encodable::<T>(tag)?;
        let envelope = BinaryEnvelope {
            tag: tag.to_string(),
            payload: value.encode_value(Format::Binary)?,
        };
        Format::Binary.encode(&envelope)
    }

    pub fn unmarshal_binary<T: Interface>(&self, bytes: &[u8]) -> CodecResult<T> {
        let envelope: BinaryEnvelope = Format::Binary.decode(bytes)?;
        self.ensure_registered(T::NAME, &envelope.tag)?;
        T::decode_value(&envelope.tag, Format::Binary, &envelope.payload)
    }

    // -- JSON ---------------------------------------------------------------

    pub fn marshal_json<T: Interface>(&self, value: &T) -> CodecResult<JsonEnvelope> {
        let tag = value.type_tag();
        self.ensure_encodable::<T>(tag)?;
        let bytes = value.encode_value(Format::Json)?;
        Ok(JsonEnvelope {
            type_tag: tag.to_string(),
            value: Format::Json.decode(&bytes)?,
        })
    }

    pub fn unmarshal_json<T: Interface>(&self, envelope: &JsonEnvelope) -> CodecResult<T> {
        self.ensure_registered(T::NAME, &envelope.type_tag)?;
        let bytes = Format::Json.encode(&envelope.value)?;
        T::decode_value(&envelope.type_tag, Format::Json, &bytes)
    }

    fn ensure_encodable<T: Interface>(&self, tag: &str) -> CodecResult<()> {
        match self.concretes.get(tag) {
            Some(owner) if owner == T::NAME => Ok(()),
            _ => Err(CodecError::Unregistered(tag.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pong {
        label: String,
    }

    #[derive(Debug, PartialEq)]
    enum Shape {
        Ping(Ping),
        Pong(Pong),
    }

    impl Interface for Shape {
        const NAME: &'static str = "Shape";

        fn type_tag(&self) -> &'static str {
            match self {
                Shape::Ping(_) => "test/Ping",
                Shape::Pong(_) => "test/Pong",
            }
        }

        fn encode_value(&self, format: Format) -> CodecResult<Vec<u8>> {
            match self {
                Shape::Ping(v) => format.encode(v),
                Shape::Pong(v) => format.encode(v),
            }
        }

        fn decode_value(tag: &str, format: Format, bytes: &[u8]) -> CodecResult<Self> {
            match tag {
                "test/Ping" => Ok(Shape::Ping(format.decode(bytes)?)),
                "test/Pong" => Ok(Shape::Pong(format.decode(bytes)?)),
                other => Err(unknown_type::<Self>(other)),
            }
        }
    }

    fn codec(tags: &[&str]) -> Codec {
        let mut cdc = Codec::new();
        cdc.register_interface("Shape").unwrap();
        for tag in tags {
            cdc.register_concrete("Shape", tag).unwrap();
        }
        cdc.seal();
        cdc
    }

    #[test]
    fn binary_and_json_round_trip() {
        let cdc = codec(&["test/Ping", "test/Pong"]);
        let ping = Shape::Ping(Ping { n: 7 });
        let bytes = cdc.marshal_binary(&ping).unwrap();
        assert_eq!(cdc.unmarshal_binary::<Shape>(&bytes).unwrap(), ping);

        let pong = Shape::Pong(Pong { label: "x".into() });
        let envelope = cdc.marshal_json(&pong).unwrap();
        assert_eq!(envelope.type_tag, "test/Pong");
        assert_eq!(cdc.unmarshal_json::<Shape>(&envelope).unwrap(), pong);
    }

    #[test]
    fn unregistered_tag_fails_decode() {
        let full = codec(&["test/Ping", "test/Pong"]);
        let narrow = codec(&["test/Ping"]);
        let bytes = full.marshal_binary(&Shape::Pong(Pong { label: "y".into() })).unwrap();
        assert_eq!(
            narrow.unmarshal_binary::<Shape>(&bytes),
            Err(CodecError::UnknownType {
                interface: "Shape".into(),
                tag: "test/Pong".into()
            })
        );
    }

    #[test]
    fn unregistered_tag_refuses_to_encode() {
        let narrow = codec(&["test/Ping"]);
        assert!(matches!(
            narrow.marshal_binary(&Shape::Pong(Pong { label: "z".into() })),
            Err(CodecError::Unregistered(_))
        ));
    }

    #[test]
    fn json_with_foreign_tag_is_rejected() {
        let cdc = codec(&["test/Ping"]);
        let envelope = JsonEnvelope {
            type_tag: "evil/Ping".into(),
            value: serde_json::json!({ "n": 1 }),
        };
        assert!(matches!(
            cdc.unmarshal_json::<Shape>(&envelope),
            Err(CodecError::UnknownType { .. })
        ));
    }

    #[test]
    fn registration_rules() {
        let mut cdc = Codec::new();
        assert_eq!(
            cdc.register_concrete("Shape", "test/Ping"),
            Err(ConfigError::UnknownInterface("Shape".into()))
        );
        cdc.register_interface("Shape").unwrap();
        cdc.register_interface("Other").unwrap();
        assert!(cdc.register_interface("Shape").is_err());
        cdc.register_concrete("Shape", "test/Ping").unwrap();
        assert_eq!(
            cdc.register_concrete("Other", "test/Ping"),
            Err(ConfigError::DuplicateTypeTag("test/Ping".into()))
        );
    }

    #[test]
    fn sealed_codec_rejects_registration_and_keeps_schema() {
        let mut cdc = codec(&["test/Ping"]);
        assert_eq!(
            cdc.register_concrete("Shape", "test/Pong"),
            Err(ConfigError::Sealed("codec"))
        );
        assert_eq!(cdc.register_interface("New"), Err(ConfigError::Sealed("codec")));
        assert_eq!(cdc.tags("Shape"), vec!["test/Ping"]);
    }
}
