//! Fixed-width account addresses.
//!
//! An address is the first 20 bytes of `SHA-256(pub_key)`. On the wire and
//! in genesis documents it is lowercase hex; in the account store it is the
//! raw 20 bytes, so store-native iteration order is byte order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::ADDRESS_LENGTH;
use crate::error::TxError;

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives the address controlled by a public key.
    pub fn from_pub_key(pub_key: &[u8]) -> Self {
        let digest = Sha256::digest(pub_key);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Parses an address from a raw byte slice, which must be exactly
    /// 20 bytes long.
    pub fn from_slice(slice: &[u8]) -> Result<Self, TxError> {
        let bytes: [u8; ADDRESS_LENGTH] = slice.try_into().map_err(|_| {
            TxError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TxError::InvalidAddress(format!("{s}: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let addr = Address::from_pub_key(b"alice");
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(Address::from_pub_key(b"k"), Address::from_pub_key(b"k"));
        assert_ne!(Address::from_pub_key(b"k"), Address::from_pub_key(b"j"));
    }

    #[test]
    fn wrong_width_is_rejected() {
        assert!(matches!(
            "abcd".parse::<Address>(),
            Err(TxError::InvalidAddress(_))
        ));
        assert!("zz".repeat(20).parse::<Address>().is_err());
    }

    #[test]
    fn json_form_is_hex_string() {
        let addr = Address::from_bytes([0xAB; ADDRESS_LENGTH]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
