//! OAuth identity-provider seam.
//!
//! The redirect dance itself happens outside the core; the wallet only
//! needs the authorization URL, the code-for-token exchange, and the
//! issuer's current RSA public key for the proof input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zksw_common::Value;

use crate::WalletError;

/// RSA public key of the token issuer, as exact integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerKey {
    pub exponent: Value,
    pub modulus: Value,
}

#[async_trait]
pub trait OauthProvider: Send + Sync {
    /// URL to redirect the user to, carrying the correlation token as the
    /// OAuth `state` parameter.
    fn auth_url(&self, state: &str) -> String;

    /// Exchange the callback's authorization code for the signed identity
    /// token (raw three-segment form).
    async fn exchange_code(&self, code: &str) -> Result<String, WalletError>;

    /// Issuer key the token signature verifies under. Fetched per login;
    /// issuers rotate keys.
    async fn issuer_key(&self) -> Result<IssuerKey, WalletError>;
}
