//! Smart wallet orchestration core.
//!
//! Spending authority on this wallet is proven by possession of a valid
//! OAuth-issued identity token rather than a locally held key alone. The
//! [`Wallet`] state machine absorbs the token after the external OAuth
//! redirect completes, decides between the fresh and activated spending
//! paths, drives proof pre-computation against the remote prover, assembles
//! and signs transactions client-side, and watches submissions to
//! settlement, emitting [`WalletEvent`]s along the way.

mod backend;
mod config;
mod error;
mod events;
mod identity;
mod ledger;
mod oauth;
mod storage;
mod tx;
mod wallet;
mod watcher;

pub use backend::{
    ActivationTxRequest, Backend, HttpBackend, NotificationFailure, SpendTxRequest, SubmitResult,
};
pub use config::{Network, WalletConfig};
pub use error::WalletError;
pub use events::WalletEvent;
pub use identity::{IdentityClaims, IdentityToken, KeyMaterial, SigningIdentity, DERIVATION_PATH};
pub use ledger::{FeeParams, LedgerToolkit};
pub use oauth::{IssuerKey, OauthProvider};
pub use storage::{get_json, KvStore, MemoryStore, WalletRecord, SESSION_CORRELATION_KEY};
pub use tx::{check_affordable, native_balance, plan_direct, total_requested, DirectPlan};
pub use wallet::{Wallet, WalletHandles};
