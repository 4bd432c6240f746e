//! Proof material exchanged with the remote prover.

use serde::{Deserialize, Serialize};

use crate::{serde_hex, Value};

/// Input to the proof computation.
///
/// Binds the identity token's RSA signature to the wallet's public key hash.
/// Every field is a [`Value`]: these scalars are far wider than 2^53 and a
/// float intermediate anywhere on this path would corrupt them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInput {
    /// Issuer RSA public exponent.
    pub public_exponent: Value,
    /// Issuer RSA public modulus.
    pub modulus: Value,
    /// Signature segment of the identity token, as an integer.
    pub token_signature: Value,
    /// Binds the proof to the wallet's public key hash.
    pub key_binding: Value,
}

/// The proof bundle returned by the prover.
///
/// Fixed shape: opaque polynomial commitments (hex byte-strings on the
/// wire) plus the evaluation points and challenges as exact integers.
/// Computed at most once per (identity, signing key) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "serde_hex")]
    pub cm_a: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_b: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_c: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_z: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_t_low: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_t_mid: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_t_high: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_w_xi: Vec<u8>,
    #[serde(with = "serde_hex")]
    pub cm_w_xi_omega: Vec<u8>,

    pub eval_a: Value,
    pub eval_b: Value,
    pub eval_c: Value,
    pub eval_s_sigma1: Value,
    pub eval_s_sigma2: Value,
    pub eval_z_omega: Value,
    pub eval_t: Value,
    pub eval_r: Value,
    pub eval_l1: Value,
    pub eval_pi: Value,
    pub challenge_beta: Value,
    pub challenge_gamma: Value,
    pub challenge_alpha: Value,
    pub challenge_xi: Value,
    pub challenge_v: Value,
}

/// One entry of the prover's published public-key set.
///
/// Used once per proof request. Never cache a record across modulus
/// rotations without re-fetching the set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverKey {
    pub key_id: String,
    pub exponent: Value,
    pub modulus: Value,
    pub bits: u32,
}
