//! Lifecycle notifications for callers (e.g. a UI layer).

use zksw_common::ActivationState;

/// Emitted on the wallet's broadcast channel so callers can react without
/// polling the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// Login completed; the wallet is ready on the given address.
    Initialized {
        address: String,
        activation: ActivationState,
    },
    /// Background proof pre-computation finished.
    ProofReady,
    /// A transaction was submitted and is awaiting settlement.
    TxPending { tx_id: String },
    /// The submitted transaction was observed on-chain.
    TxConfirmed { tx_id: String },
    /// Confirmation watching ended with an error.
    TxFailed { tx_id: String, error: String },
    /// All identity state was cleared.
    LoggedOut,
}
