//! # Coins
//!
//! A [`Coins`] value is a set of typed amounts: sorted by denomination,
//! no duplicate denominations, no zero amounts. Every constructor and the
//! deserializer enforce this, so two equal balances always have identical
//! bytes. All arithmetic is checked; a subtraction that would go negative
//! in any denomination yields `None` instead of a result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TxError;

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// A single amount of one denomination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Denominations are 2 to 16 characters: a lowercase letter followed by
/// lowercase letters or digits.
fn validate_denom(denom: &str) -> Result<(), TxError> {
    let mut chars = denom.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !first_ok || !rest_ok || !(2..=16).contains(&denom.len()) {
        return Err(TxError::InvalidCoins(format!("invalid denom '{denom}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

/// Sorted, duplicate-free, zero-free set of coins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Builds a coin set. Zero amounts are dropped; duplicate or malformed
    /// denominations are rejected.
    pub fn new(coins: Vec<Coin>) -> Result<Self, TxError> {
        let mut by_denom = BTreeMap::new();
        for coin in coins {
            validate_denom(&coin.denom)?;
            if by_denom.insert(coin.denom.clone(), coin.amount).is_some() {
                return Err(TxError::InvalidCoins(format!(
                    "duplicate denom '{}'",
                    coin.denom
                )));
            }
        }
        Ok(Self::from_map(by_denom))
    }

    /// An empty balance.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// A balance of one denomination. The denomination is not validated,
    /// so callers pass the constants from [`crate::config`].
    pub fn single(denom: &str, amount: u64) -> Self {
        if amount == 0 {
            return Self::empty();
        }
        Self(vec![Coin::new(denom, amount)])
    }

    fn from_map(map: BTreeMap<String, u64>) -> Self {
        Self(
            map.into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(denom, amount)| Coin { denom, amount })
                .collect(),
        )
    }

    fn to_map(&self) -> BTreeMap<String, u64> {
        self.0
            .iter()
            .map(|c| (c.denom.clone(), c.amount))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    /// Amount held of `denom`, zero when absent.
    pub fn amount_of(&self, denom: &str) -> u64 {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .map(|i| self.0[i].amount)
            .unwrap_or(0)
    }

    /// Sum of two coin sets, `None` on overflow.
    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        let mut map = self.to_map();
        for coin in &other.0 {
            let entry = map.entry(coin.denom.clone()).or_insert(0);
            *entry = entry.checked_add(coin.amount)?;
        }
        Some(Self::from_map(map))
    }

    /// Difference of two coin sets, `None` if any denomination would go
    /// negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut map = self.to_map();
        for coin in &other.0 {
            let entry = map.entry(coin.denom.clone()).or_insert(0);
            *entry = entry.checked_sub(coin.amount)?;
        }
        Some(Self::from_map(map))
    }

    /// Whether every denomination in `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = TxError;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        let parts: Vec<String> = self.0.iter().map(Coin::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(pairs: &[(&str, u64)]) -> Coins {
        Coins::new(pairs.iter().map(|(d, a)| Coin::new(*d, *a)).collect()).unwrap()
    }

    #[test]
    fn normalizes_order_and_zeros() {
        let c = coins(&[("steak", 5), ("atom", 0), ("pow", 3)]);
        assert_eq!(c.to_string(), "3pow,5steak");
        assert_eq!(c.amount_of("atom"), 0);
    }

    #[test]
    fn rejects_duplicates_and_bad_denoms() {
        assert!(Coins::new(vec![Coin::new("pow", 1), Coin::new("pow", 2)]).is_err());
        assert!(Coins::new(vec![Coin::new("Pow", 1)]).is_err());
        assert!(Coins::new(vec![Coin::new("p", 1)]).is_err());
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let have = coins(&[("pow", 10)]);
        assert_eq!(have.checked_sub(&coins(&[("pow", 4)])), Some(coins(&[("pow", 6)])));
        assert_eq!(have.checked_sub(&coins(&[("pow", 11)])), None);
        assert_eq!(have.checked_sub(&coins(&[("cool", 1)])), None);
        assert_eq!(have.checked_sub(&have), Some(Coins::empty()));
    }

    #[test]
    fn addition_detects_overflow() {
        let max = coins(&[("pow", u64::MAX)]);
        assert_eq!(max.checked_add(&coins(&[("pow", 1)])), None);
        assert_eq!(
            coins(&[("pow", 1)]).checked_add(&coins(&[("cool", 2)])),
            Some(coins(&[("cool", 2), ("pow", 1)]))
        );
    }

    #[test]
    fn deserialization_validates() {
        let ok: Coins = serde_json::from_str(r#"[{"denom":"pow","amount":3}]"#).unwrap();
        assert_eq!(ok.amount_of("pow"), 3);
        let dup = serde_json::from_str::<Coins>(
            r#"[{"denom":"pow","amount":3},{"denom":"pow","amount":1}]"#,
        );
        assert!(dup.is_err());
    }

    #[test]
    fn gte_covers_missing_denoms() {
        let have = coins(&[("pow", 10), ("cool", 1)]);
        assert!(have.is_all_gte(&coins(&[("pow", 10)])));
        assert!(!have.is_all_gte(&coins(&[("steak", 1)])));
        assert!(have.is_all_gte(&Coins::empty()));
    }
}
