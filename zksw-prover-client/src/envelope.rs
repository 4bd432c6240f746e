//! Hybrid envelope encryption for proof inputs.
//!
//! The serialized proof input is encrypted under a one-time AES-256 session
//! key in CBC mode, IV prepended to the ciphertext; the session key itself
//! is wrapped under the selected prover RSA key. Both halves travel
//! hex-encoded in the submission payload.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use rand::{CryptoRng, RngCore};
use rsa::{BigUint as RsaUint, Oaep, Pkcs1v15Encrypt, RsaPublicKey};
use zksw_common::{ProofInput, ProverKey};

use crate::api::SealedRequest;
use crate::ProverError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const SESSION_KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Asymmetric padding used to wrap the session key.
///
/// Both are supported wire variants; a deployment picks the one its prover
/// expects and sticks with it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyWrap {
    /// RSAES-OAEP with SHA-256. The default.
    #[default]
    OaepSha256,
    /// RSAES-PKCS1-v1_5, for provers that predate the OAEP rollout.
    Pkcs1V15,
}

/// Encrypt `input` for one-time transmission under `key`.
pub fn seal_request(
    input: &ProofInput,
    key: &ProverKey,
    wrap: KeyWrap,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<SealedRequest, ProverError> {
    let plaintext =
        serde_json::to_vec(input).map_err(|e| ProverError::Encryption(e.to_string()))?;

    let mut session_key = [0u8; SESSION_KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut session_key);
    rng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&session_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    // IV travels prepended to the ciphertext.
    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&ciphertext);

    let public_key = RsaPublicKey::new(
        RsaUint::from_bytes_be(&key.modulus.to_bytes_be()),
        RsaUint::from_bytes_be(&key.exponent.to_bytes_be()),
    )
    .map_err(|e| ProverError::Encryption(format!("invalid prover key {}: {e}", key.key_id)))?;

    let wrapped_key = match wrap {
        KeyWrap::OaepSha256 => public_key.encrypt(rng, Oaep::new::<sha2::Sha256>(), &session_key),
        KeyWrap::Pkcs1V15 => public_key.encrypt(rng, Pkcs1v15Encrypt, &session_key),
    }
    .map_err(|e| ProverError::Encryption(format!("session key wrap failed: {e}")))?;

    Ok(SealedRequest {
        key_id: key.key_id.clone(),
        enc_key: hex::encode(wrapped_key),
        payload: hex::encode(payload),
    })
}
