//! Deterministic fixtures reused across zksw member tests: an RSA prover
//! keypair, a synthetic identity token with known claims, a fixture proof
//! bundle, and canned UTXO sets.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use zksw_common::{AssetMap, Proof, ProofInput, ProverKey, Utxo, UtxoRef, Value};

/// Small enough to generate quickly in debug builds, large enough to wrap a
/// 32-byte session key under OAEP-SHA256 (needs > 66 bytes of modulus).
const FIXTURE_RSA_BITS: usize = 1024;
const FIXTURE_SEED: u64 = 0x5a5a_0001;

pub const FIXTURE_EMAIL: &str = "alice@example.com";
pub const FIXTURE_KEY_ID: &str = "fixture-key-1";

static FIXTURES: OnceCell<TestFixtures> = OnceCell::new();

/// Lazily generated fixture set; the RSA keygen runs once per process.
pub fn fixtures() -> &'static TestFixtures {
    FIXTURES.get_or_init(TestFixtures::generate)
}

pub struct TestFixtures {
    prover_private: RsaPrivateKey,
    prover_key: ProverKey,
    identity_token: String,
    proof: Proof,
}

impl TestFixtures {
    fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(FIXTURE_SEED);
        let prover_private =
            RsaPrivateKey::new(&mut rng, FIXTURE_RSA_BITS).expect("fixture RSA keygen");
        let public = prover_private.to_public_key();

        let prover_key = ProverKey {
            key_id: FIXTURE_KEY_ID.to_string(),
            exponent: Value::from_be_bytes(&public.e().to_bytes_be()),
            modulus: Value::from_be_bytes(&public.n().to_bytes_be()),
            bits: FIXTURE_RSA_BITS as u32,
        };

        Self {
            prover_private,
            prover_key,
            identity_token: build_identity_token(),
            proof: build_proof(),
        }
    }

    /// Private half of the fixture prover key, for tests that unwrap
    /// sealed requests.
    pub fn prover_private(&self) -> &RsaPrivateKey {
        &self.prover_private
    }

    /// Published-key record as the prover would list it.
    pub fn prover_key(&self) -> &ProverKey {
        &self.prover_key
    }

    /// Three-segment signed identity token asserting [`FIXTURE_EMAIL`].
    pub fn identity_token(&self) -> &str {
        &self.identity_token
    }

    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    /// A plausible proof input bound to the fixture prover key.
    pub fn proof_input(&self) -> ProofInput {
        ProofInput {
            public_exponent: self.prover_key.exponent.clone(),
            modulus: self.prover_key.modulus.clone(),
            token_signature: Value::from_be_bytes(&[0xab; 128]),
            key_binding: Value::from_be_bytes(&[0x17; 28]),
        }
    }
}

fn build_identity_token() -> String {
    let header = serde_json::json!({
        "alg": "RS256",
        "typ": "JWT",
        "kid": FIXTURE_KEY_ID,
    });
    let payload = serde_json::json!({
        "iss": "https://accounts.example.com",
        "aud": "zksw-client",
        "sub": "10769150350006150715113082367",
        "email": FIXTURE_EMAIL,
        "email_verified": true,
        "nonce": "fixture-nonce",
    });
    let signature = [0x42u8; 128];

    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header json")),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).expect("payload json")),
        URL_SAFE_NO_PAD.encode(signature),
    )
}

fn build_proof() -> Proof {
    let cm = |tag: u8| -> Vec<u8> { vec![tag; 48] };
    let ev = |tag: u64| -> Value {
        // Wide, distinct, deterministic scalars (> 2^192).
        let mut v = Value::from_u64(tag);
        let shift: Value = "6277101735386680763835789423207666416102355444464034512896"
            .parse()
            .expect("shift literal");
        v.increase(&shift);
        v
    };

    Proof {
        cm_a: cm(0xa1),
        cm_b: cm(0xb2),
        cm_c: cm(0xc3),
        cm_z: cm(0xd4),
        cm_t_low: cm(0xe5),
        cm_t_mid: cm(0xf6),
        cm_t_high: cm(0x07),
        cm_w_xi: cm(0x18),
        cm_w_xi_omega: cm(0x29),
        eval_a: ev(1),
        eval_b: ev(2),
        eval_c: ev(3),
        eval_s_sigma1: ev(4),
        eval_s_sigma2: ev(5),
        eval_z_omega: ev(6),
        eval_t: ev(7),
        eval_r: ev(8),
        eval_l1: ev(9),
        eval_pi: ev(10),
        challenge_beta: ev(11),
        challenge_gamma: ev(12),
        challenge_alpha: ev(13),
        challenge_xi: ev(14),
        challenge_v: ev(15),
    }
}

/// Canned UTXO set: one native-coin UTXO per amount, all owned by `address`.
pub fn utxo_set(address: &str, native_amounts: &[u64]) -> Vec<Utxo> {
    native_amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| Utxo {
            reference: UtxoRef::new(format!("{:064x}", i + 1), 0),
            address: address.to_string(),
            value: AssetMap::native_only(Value::from_u64(*amount)),
        })
        .collect()
}
