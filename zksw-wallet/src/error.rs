//! Wallet failure taxonomy.
//!
//! Non-retryable protocol/state errors and local insufficient-funds checks
//! surface immediately; transient transport problems inside the poll loops
//! never reach this type (the loops retry them); malformed collaborator
//! responses are fatal for the call site. Per-recipient notification
//! failures are data on [`crate::SubmitResult`], never an error.

use zksw_common::Value;
use zksw_prover_client::ProverError;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// No login in progress: the persisted correlation token is missing.
    #[error("missing correlation token: no login in progress")]
    MissingCorrelation,

    /// The callback's state parameter does not match the persisted
    /// correlation token. CSRF-style rejection, no collaborator is called.
    #[error("correlation token mismatch")]
    CorrelationMismatch,

    /// The identity provider's callback carried no authorization code.
    #[error("authorization code missing from callback")]
    MissingAuthorizationCode,

    /// Exchanging the authorization code for an identity token failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// An identity-dependent operation was called before login completed.
    #[error("wallet not initialized")]
    NotInitialized,

    /// The operation needs an OAuth identity but the wallet holds a
    /// mnemonic-derived one.
    #[error("operation requires an OAuth-derived identity")]
    RequiresOauthIdentity,

    /// Detected locally before any network call; carries the shortfall.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Value, available: Value },

    /// The identity token failed to parse into its three segments/claims.
    #[error("malformed identity token: {0}")]
    InvalidToken(String),

    /// Network-level failure reaching the backend.
    #[error("backend transport error: {0}")]
    Backend(String),

    /// The backend answered with an unexpected shape. Fatal, not retried.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// Ledger toolkit failure (parse, witness attachment, build).
    #[error("ledger toolkit error: {0}")]
    Toolkit(String),

    #[error(transparent)]
    Prover(#[from] ProverError),

    /// The wallet instance was torn down while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}
