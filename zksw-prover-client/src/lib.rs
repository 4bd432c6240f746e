//! Client for the remote prover collaborator.
//!
//! Obtains a [`zksw_common::Proof`] for a [`zksw_common::ProofInput`] without
//! ever transmitting the input in the clear: the serialized input travels in
//! a hybrid envelope (fresh AES-256-CBC session key, wrapped under one of the
//! prover's published RSA keys), and completion is observed by polling the
//! prover's status endpoint at a fixed interval until the proof is ready or
//! the caller cancels.

mod api;
mod client;
mod envelope;

pub use api::{HttpProver, ProofStatus, ProverApi, SealedRequest};
pub use client::{KeySelection, ProverClient, ProverClientConfig};
pub use envelope::{seal_request, KeyWrap};

/// Prover-side failure taxonomy.
///
/// Transport errors are retryable (the poll loop treats them as "not ready
/// yet"); everything else is fatal for the call site.
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// Network-level failure reaching the prover. Retryable while polling.
    #[error("prover transport error: {0}")]
    Transport(String),
    /// The prover answered, but not with the shape we expect. Fatal.
    #[error("malformed prover response: {0}")]
    Malformed(String),
    /// The prover published no usable key, or the configured selection
    /// matched none of them.
    #[error("no usable prover key: {0}")]
    KeySelection(String),
    /// Envelope construction failed (RSA wrap or symmetric encryption).
    #[error("envelope encryption failed: {0}")]
    Encryption(String),
    /// The caller cancelled the request via its cancellation token.
    #[error("proof request cancelled")]
    Cancelled,
}
