//! Prover HTTP API surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zksw_common::{Proof, ProverKey};

use crate::ProverError;

/// Encrypted proof submission payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRequest {
    /// Identifier of the prover key the session key is wrapped under.
    pub key_id: String,
    /// Hex-encoded RSA-wrapped session key.
    pub enc_key: String,
    /// Hex-encoded IV-prefixed ciphertext of the proof input.
    pub payload: String,
}

/// Status of a submitted proof request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Completed { proof: Proof },
}

/// The prover collaborator, seam for tests.
#[async_trait]
pub trait ProverApi: Send + Sync {
    /// Currently published public-key set. Re-fetched per proof request;
    /// records must not be cached across modulus rotations.
    async fn fetch_keys(&self) -> Result<Vec<ProverKey>, ProverError>;

    /// Submit a sealed request; returns the prover's opaque request id.
    async fn submit(&self, request: &SealedRequest) -> Result<String, ProverError>;

    /// Poll the status of a previously submitted request.
    async fn status(&self, request_id: &str) -> Result<ProofStatus, ProverError>;
}

#[async_trait]
impl<T: ProverApi + ?Sized> ProverApi for std::sync::Arc<T> {
    async fn fetch_keys(&self) -> Result<Vec<ProverKey>, ProverError> {
        (**self).fetch_keys().await
    }

    async fn submit(&self, request: &SealedRequest) -> Result<String, ProverError> {
        (**self).submit(request).await
    }

    async fn status(&self, request_id: &str) -> Result<ProofStatus, ProverError> {
        (**self).status(request_id).await
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    request_id: String,
}

/// Prover over HTTP+JSON.
pub struct HttpProver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Decode failures mean the prover answered garbage (fatal); everything
    /// else on the reqwest side is a transport problem (retryable).
    fn classify(err: reqwest::Error) -> ProverError {
        if err.is_decode() {
            ProverError::Malformed(err.to_string())
        } else {
            ProverError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ProverApi for HttpProver {
    async fn fetch_keys(&self) -> Result<Vec<ProverKey>, ProverError> {
        self.client
            .get(self.url("keys"))
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }

    async fn submit(&self, request: &SealedRequest) -> Result<String, ProverError> {
        let response: SubmitResponse = self
            .client
            .post(self.url("proofs"))
            .json(request)
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)?;
        Ok(response.request_id)
    }

    async fn status(&self, request_id: &str) -> Result<ProofStatus, ProverError> {
        self.client
            .get(self.url(&format!("proofs/{request_id}")))
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }
}
