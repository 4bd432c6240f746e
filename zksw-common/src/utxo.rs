//! UTXO references, spendable fund fragments, and transaction outputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AssetMap, ParseError};

/// Reference to a transaction output: `<txid>#<index>` in canonical text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoRef {
    pub tx_id: String,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

impl FromStr for UtxoRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx_id, index) = s
            .rsplit_once('#')
            .ok_or_else(|| ParseError::UtxoRef(s.to_string()))?;
        if tx_id.is_empty() {
            return Err(ParseError::UtxoRef(s.to_string()));
        }
        let index = index
            .parse::<u32>()
            .map_err(|_| ParseError::UtxoRef(s.to_string()))?;
        Ok(UtxoRef::new(tx_id, index))
    }
}

impl Serialize for UtxoRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UtxoRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A spendable fund fragment as of the query that fetched it (may be stale).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(rename = "ref")]
    pub reference: UtxoRef,
    pub address: String,
    pub value: AssetMap,
}

/// Destination for a transaction build request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    /// Optional inline datum attachment, hex-encoded on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    pub value: AssetMap,
}

impl Output {
    pub fn payment(address: impl Into<String>, value: AssetMap) -> Self {
        Self {
            address: address.into(),
            datum: None,
            value,
        }
    }
}
