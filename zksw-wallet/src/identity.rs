//! Identity tokens and signing-key material.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use zksw_common::Value;

use crate::WalletError;

/// Fixed hierarchical derivation path label for the payment key.
pub const DERIVATION_PATH: &str = "m/1852'/1815'/0'/0/0";

/// Ledger key hashes are 28 bytes by convention.
const KEY_HASH_LEN: usize = 28;

/// Claims the core reads from the identity token payload.
#[derive(Clone, Debug, Deserialize)]
pub struct IdentityClaims {
    pub iss: String,
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// A parsed OAuth-issued signed token: three dot-separated base64url
/// segments (header, payload, signature).
#[derive(Clone, Debug)]
pub struct IdentityToken {
    raw: String,
    claims: IdentityClaims,
    signature: Vec<u8>,
}

impl IdentityToken {
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let segments: Vec<&str> = raw.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(WalletError::InvalidToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        // Header must decode, but nothing in it is consumed here.
        URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|e| WalletError::InvalidToken(format!("header: {e}")))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| WalletError::InvalidToken(format!("payload: {e}")))?;
        let claims: IdentityClaims = serde_json::from_slice(&payload_bytes)
            .map_err(|e| WalletError::InvalidToken(format!("claims: {e}")))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| WalletError::InvalidToken(format!("signature: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            claims,
            signature,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }

    /// Verified user identifier the wallet address is bound to.
    pub fn user_id(&self) -> &str {
        &self.claims.email
    }

    /// `header.payload` without the signature segment, as the activation
    /// build endpoint expects it.
    pub fn strip_signature(&self) -> String {
        match self.raw.rsplit_once('.') {
            Some((prefix, _)) => prefix.to_string(),
            None => self.raw.clone(),
        }
    }

    /// Signature segment as an exact integer for the proof input.
    pub fn signature_value(&self) -> Value {
        Value::from_be_bytes(&self.signature)
    }
}

/// Signing-key material derived from a 32-byte seed under the fixed path.
///
/// The seed, not the derived key, is what gets persisted; restoring a
/// wallet reruns the same derivation.
#[derive(Clone)]
pub struct KeyMaterial {
    seed: [u8; 32],
    signing: SigningKey,
}

impl KeyMaterial {
    /// Fresh random seed. Used exactly once per identity; afterwards the
    /// persisted seed is restored instead.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Deterministic derivation: HKDF-SHA512 keyed by the seed, salted with
    /// the hierarchical path label.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let hk = Hkdf::<Sha512>::new(Some(DERIVATION_PATH.as_bytes()), &seed);
        let mut key_bytes = [0u8; 32];
        hk.expand(b"payment signing key", &mut key_bytes)
            .expect("32 bytes is within hkdf output bounds");
        Self {
            seed,
            signing: SigningKey::from_bytes(&key_bytes),
        }
    }

    /// Mnemonic-based variant (alternate deployment mode): the seed is
    /// stretched from the phrase instead of sampled.
    pub fn from_mnemonic(phrase: &str) -> Self {
        let hk = Hkdf::<Sha512>::new(Some(b"mnemonic"), phrase.as_bytes());
        let mut seed = [0u8; 32];
        hk.expand(b"wallet seed", &mut seed)
            .expect("32 bytes is within hkdf output bounds");
        Self::from_seed(seed)
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// 28-byte hash of the verifying key.
    pub fn key_hash(&self) -> Vec<u8> {
        let digest = Sha256::digest(self.signing.verifying_key().as_bytes());
        digest[..KEY_HASH_LEN].to_vec()
    }

    /// Key hash as an exact integer, binding a proof to this wallet.
    pub fn key_binding(&self) -> Value {
        Value::from_be_bytes(&self.key_hash())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the seed.
        f.debug_struct("KeyMaterial")
            .field("verifying_key", &hex::encode(self.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

/// The wallet's identity source.
///
/// Historical deployments shipped both OAuth-token and mnemonic wallets;
/// they are variants of one abstraction rather than separate wallet types.
/// The activation/spend paths require [`SigningIdentity::OauthToken`]; the
/// direct peer-to-peer path works with either.
#[derive(Clone, Debug)]
pub enum SigningIdentity {
    OauthToken {
        token: IdentityToken,
        keys: KeyMaterial,
    },
    Mnemonic {
        keys: KeyMaterial,
    },
}

impl SigningIdentity {
    pub fn keys(&self) -> &KeyMaterial {
        match self {
            SigningIdentity::OauthToken { keys, .. } => keys,
            SigningIdentity::Mnemonic { keys } => keys,
        }
    }

    pub fn token(&self) -> Option<&IdentityToken> {
        match self {
            SigningIdentity::OauthToken { token, .. } => Some(token),
            SigningIdentity::Mnemonic { .. } => None,
        }
    }
}
