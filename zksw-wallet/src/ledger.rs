//! Ledger toolkit seam.
//!
//! The serialization/signing library is opaque to this core: it builds
//! transaction bytes, computes addresses, and attaches witnesses. Calls are
//! synchronous — the toolkit is a local library, not a network service.

use zksw_common::{Output, UtxoRef, Value};

use crate::config::Network;
use crate::identity::KeyMaterial;
use crate::WalletError;

/// Protocol constants the toolkit exposes for client-side building.
#[derive(Clone, Debug)]
pub struct FeeParams {
    /// Flat fee reserved per transaction.
    pub fee: Value,
    /// Deposit charged by activation-style outputs.
    pub deposit: Value,
}

pub trait LedgerToolkit: Send + Sync {
    /// Bech32 address for a public-key hash on the given network.
    fn address_for_key_hash(&self, key_hash: &[u8], network: Network)
        -> Result<String, WalletError>;

    /// Parse hex transaction bytes, attach a single vkey witness from
    /// `keys`, and re-encode. Signing always happens client-side.
    fn sign_tx(&self, tx_hex: &str, keys: &KeyMaterial) -> Result<String, WalletError>;

    /// Build a payment transaction from raw inputs and outputs (the direct
    /// peer-to-peer mode); returns unsigned transaction bytes, hex-encoded.
    fn build_payment_tx(
        &self,
        inputs: &[UtxoRef],
        outputs: &[Output],
        change: &Output,
        params: &FeeParams,
    ) -> Result<String, WalletError>;

    /// Fixed fee/deposit constants for the current network.
    fn fee_params(&self) -> FeeParams;
}
