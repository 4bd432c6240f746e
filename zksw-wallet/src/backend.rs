//! Backend collaborator: address resolution, transaction building,
//! submission, UTXO listing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zksw_common::{Output, Proof, Utxo};

use crate::WalletError;

/// Build request for the activation-inclusive path: the spend and the
/// wallet activation travel in a single transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivationTxRequest {
    /// Identity token with the signature segment stripped.
    pub token: String,
    /// Hex-encoded public-key hash of the wallet's signing key.
    pub key_hash: String,
    pub proof: Proof,
    pub outputs: Vec<Output>,
}

/// Build request for the activated path; never includes the proof.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpendTxRequest {
    /// Full identity token.
    pub token: String,
    pub key_hash: String,
    pub outputs: Vec<Output>,
}

/// One recipient the backend could not notify. Non-fatal: the transaction
/// itself succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFailure {
    pub address: String,
    pub reason: String,
}

/// Result of a raw transaction submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitResult {
    pub tx_id: String,
    #[serde(default)]
    pub notification_failures: Vec<NotificationFailure>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Ledger address bound to a verified user identifier.
    async fn resolve_address(&self, user_id: &str) -> Result<String, WalletError>;

    /// Build the combined activation+spend transaction; returns unsigned
    /// transaction bytes, hex-encoded.
    async fn build_activation_tx(&self, req: &ActivationTxRequest) -> Result<String, WalletError>;

    /// Build a spend-only transaction; returns unsigned transaction bytes,
    /// hex-encoded.
    async fn build_spend_tx(&self, req: &SpendTxRequest) -> Result<String, WalletError>;

    /// Submit signed transaction bytes.
    async fn submit_tx(&self, tx_hex: &str) -> Result<SubmitResult, WalletError>;

    /// Current UTXO set at an address.
    async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>, WalletError>;
}

#[derive(Deserialize)]
struct AddressResponse {
    address: String,
}

#[derive(Deserialize)]
struct BuiltTxResponse {
    tx: String,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    tx: &'a str,
}

/// Backend over HTTP+JSON, with an optional API key sent as a bearer header.
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn classify(err: reqwest::Error) -> WalletError {
        if err.is_decode() {
            WalletError::MalformedResponse(err.to_string())
        } else {
            WalletError::Backend(err.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        self.authorize(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WalletError> {
        self.authorize(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn resolve_address(&self, user_id: &str) -> Result<String, WalletError> {
        let response: AddressResponse = self.get_json(&format!("address/{user_id}")).await?;
        Ok(response.address)
    }

    async fn build_activation_tx(&self, req: &ActivationTxRequest) -> Result<String, WalletError> {
        let response: BuiltTxResponse = self.post_json("tx/activation", req).await?;
        Ok(response.tx)
    }

    async fn build_spend_tx(&self, req: &SpendTxRequest) -> Result<String, WalletError> {
        let response: BuiltTxResponse = self.post_json("tx/spend", req).await?;
        Ok(response.tx)
    }

    async fn submit_tx(&self, tx_hex: &str) -> Result<SubmitResult, WalletError> {
        self.post_json("tx/submit", &SubmitRequest { tx: tx_hex })
            .await
    }

    async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>, WalletError> {
        self.get_json(&format!("utxos/{address}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_result_tolerates_missing_failure_list() {
        let result: SubmitResult = serde_json::from_str(r#"{"tx_id":"abc123"}"#).unwrap();
        assert_eq!(result.tx_id, "abc123");
        assert!(result.notification_failures.is_empty());

        let with_failures: SubmitResult = serde_json::from_str(
            r#"{"tx_id":"abc123","notification_failures":[{"address":"addr1","reason":"timeout"}]}"#,
        )
        .unwrap();
        assert_eq!(with_failures.notification_failures.len(), 1);
    }
}
