//! Lossless arbitrary-precision value type.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ParseError;

/// Arbitrary-precision non-negative integer.
///
/// Serializes to a JSON number of unbounded width (never through f64), and
/// deserializes from either a JSON number or a decimal string. Immutable
/// apart from explicit accumulation via [`Value::increase`].
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(BigUint);

impl Value {
    pub fn zero() -> Self {
        Value(BigUint::default())
    }

    pub fn from_u64(n: u64) -> Self {
        Value(BigUint::from(n))
    }

    pub fn from_u128(n: u128) -> Self {
        Value(BigUint::from(n))
    }

    /// Big-endian bytes interpreted as an unsigned integer.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Value(BigUint::from_bytes_be(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::default()
    }

    /// In-place accumulation.
    pub fn increase(&mut self, other: &Value) {
        self.0 += &other.0;
    }

    /// Sum as a new value; addition never overflows here.
    pub fn plus(&self, other: &Value) -> Value {
        Value(&self.0 + &other.0)
    }

    /// `None` when the result would be negative; values never underflow.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        if self.0 >= other.0 {
            Some(Value(&self.0 - &other.0))
        } else {
            None
        }
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::from_u64(n)
    }
}

impl From<BigUint> for Value {
    fn from(n: BigUint) -> Self {
        Value(n)
    }
}

impl FromStr for Value {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigUint::from_str(s)
            .map(Value)
            .map_err(|_| ParseError::Value(s.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Routing through serde_json::Number keeps the full digit string on
        // the wire; with arbitrary_precision enabled the number is stored
        // textually and never narrowed to f64/u64.
        let number: serde_json::Number = serde_json::from_str(&self.0.to_string())
            .map_err(serde::ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(serde_json::Number),
            Text(String),
        }

        let text = match Repr::deserialize(deserializer)? {
            Repr::Number(n) => n.to_string(),
            Repr::Text(s) => s,
        };
        BigUint::from_str(&text)
            .map(Value)
            .map_err(|_| serde::de::Error::custom(format!("not a non-negative integer: {text}")))
    }
}
