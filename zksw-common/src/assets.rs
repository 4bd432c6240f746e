//! Asset identifiers and per-asset value maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ParseError, Value};

/// Distinguished key for the ledger's native coin.
pub const NATIVE_ASSET: &str = "lovelace";

/// Asset identifier: the native coin or a `<policy-id>.<asset-name>` token.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetId {
    Native,
    Token { policy_id: String, asset_name: String },
}

impl AssetId {
    pub fn token(policy_id: impl Into<String>, asset_name: impl Into<String>) -> Self {
        AssetId::Token {
            policy_id: policy_id.into(),
            asset_name: asset_name.into(),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "{NATIVE_ASSET}"),
            AssetId::Token {
                policy_id,
                asset_name,
            } => write!(f, "{policy_id}.{asset_name}"),
        }
    }
}

impl FromStr for AssetId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NATIVE_ASSET {
            return Ok(AssetId::Native);
        }
        match s.split_once('.') {
            Some((policy, name)) if !policy.is_empty() => Ok(AssetId::token(policy, name)),
            _ => Err(ParseError::AssetId(s.to_string())),
        }
    }
}

impl Serialize for AssetId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Map from asset identifier to amount.
///
/// Keys are unique, insertion order is irrelevant; amounts are [`Value`]s
/// and survive the JSON wire without narrowing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetMap(BTreeMap<AssetId, Value>);

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_only(amount: Value) -> Self {
        let mut map = Self::new();
        map.set(AssetId::Native, amount);
        map
    }

    pub fn set(&mut self, asset: AssetId, amount: Value) {
        self.0.insert(asset, amount);
    }

    pub fn get(&self, asset: &AssetId) -> Option<&Value> {
        self.0.get(asset)
    }

    /// Amount of the native coin, zero when absent.
    pub fn native(&self) -> Value {
        self.0.get(&AssetId::Native).cloned().unwrap_or_default()
    }

    /// Fold another map into this one, adding amounts per asset.
    pub fn accumulate(&mut self, other: &AssetMap) {
        for (asset, amount) in &other.0 {
            self.0
                .entry(asset.clone())
                .or_insert_with(Value::zero)
                .increase(amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_canonical_text_round_trip() {
        let native: AssetId = NATIVE_ASSET.parse().unwrap();
        assert_eq!(native, AssetId::Native);

        let token: AssetId = "a0b1c2.SwapToken".parse().unwrap();
        assert_eq!(token, AssetId::token("a0b1c2", "SwapToken"));
        assert_eq!(token.to_string(), "a0b1c2.SwapToken");

        assert!(".missingpolicy".parse::<AssetId>().is_err());
    }

    #[test]
    fn accumulate_sums_per_asset() {
        let mut a = AssetMap::native_only(Value::from_u64(7));
        let mut b = AssetMap::native_only(Value::from_u64(5));
        b.set(AssetId::token("p", "t"), Value::from_u64(2));

        a.accumulate(&b);
        assert_eq!(a.native(), Value::from_u64(12));
        assert_eq!(
            a.get(&AssetId::token("p", "t")),
            Some(&Value::from_u64(2))
        );
    }

    #[test]
    fn asset_map_wire_round_trip() {
        let mut map = AssetMap::native_only(Value::from_u128(u128::MAX));
        map.set(AssetId::token("deadbeef", "Gold"), Value::from_u64(1));

        let json = serde_json::to_string(&map).unwrap();
        let back: AssetMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
