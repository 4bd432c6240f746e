//! Shared data model for the zksw smart wallet.
//!
//! Everything numeric on a wallet or proof wire path goes through [`Value`],
//! an arbitrary-precision non-negative integer: ledger amounts and proof
//! scalars routinely exceed 2^53, so no field in this crate is ever backed
//! by a float or a fixed-width integer once it leaves the ledger.

mod assets;
mod proof;
mod utxo;
mod value;

pub use assets::{AssetId, AssetMap, NATIVE_ASSET};
pub use proof::{Proof, ProofInput, ProverKey};
pub use utxo::{Output, Utxo, UtxoRef};
pub use value::Value;

use serde::{Deserialize, Serialize};

/// Whether a wallet has ever submitted its activation transaction.
///
/// The transition is one-way: `Fresh → Activated` happens exactly once, on
/// the first successful submission that carries the activation payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    /// No activation transaction has ever been submitted for this wallet.
    Fresh,
    /// An activation transaction has been submitted and observed.
    Activated,
}

impl ActivationState {
    pub fn is_fresh(&self) -> bool {
        matches!(self, ActivationState::Fresh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationState::Fresh => "fresh",
            ActivationState::Activated => "activated",
        }
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse failures for the canonical text forms in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid value literal: {0}")]
    Value(String),
    #[error("invalid UTXO reference: {0}")]
    UtxoRef(String),
    #[error("invalid asset identifier: {0}")]
    AssetId(String),
}

/// Hex-encoded byte fields on JSON wire types.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
