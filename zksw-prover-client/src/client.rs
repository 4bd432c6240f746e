//! Proof-request orchestration: select key, seal, submit, poll.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zksw_common::{Proof, ProofInput, ProverKey};

use crate::api::{ProofStatus, ProverApi};
use crate::envelope::{seal_request, KeyWrap};
use crate::ProverError;

/// Which published prover key to wrap the session key under.
///
/// The historical behavior is `First`; `ById` pins a rotation-stable key
/// identifier for deployments that need it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeySelection {
    #[default]
    First,
    ById(String),
}

impl KeySelection {
    fn select<'a>(&self, keys: &'a [ProverKey]) -> Result<&'a ProverKey, ProverError> {
        match self {
            KeySelection::First => keys
                .first()
                .ok_or_else(|| ProverError::KeySelection("empty key set".into())),
            KeySelection::ById(id) => keys
                .iter()
                .find(|k| &k.key_id == id)
                .ok_or_else(|| ProverError::KeySelection(format!("no key with id {id}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProverClientConfig {
    /// Interval between status polls.
    pub poll_interval: Duration,
    /// Session-key wrap variant the deployed prover expects.
    pub key_wrap: KeyWrap,
    /// Published-key selection policy.
    pub key_selection: KeySelection,
}

impl Default for ProverClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            key_wrap: KeyWrap::default(),
            key_selection: KeySelection::default(),
        }
    }
}

impl ProverClientConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_key_wrap(mut self, wrap: KeyWrap) -> Self {
        self.key_wrap = wrap;
        self
    }

    pub fn with_key_selection(mut self, selection: KeySelection) -> Self {
        self.key_selection = selection;
        self
    }
}

/// Drives a full proof request against a [`ProverApi`].
pub struct ProverClient<P> {
    api: P,
    config: ProverClientConfig,
}

impl<P: ProverApi> ProverClient<P> {
    pub fn new(api: P, config: ProverClientConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    /// Obtain a proof for `input`.
    ///
    /// Fetches the prover's current key set, seals the input, submits it,
    /// then polls sequentially at the configured interval until the prover
    /// reports completion. Transport errors during polling are logged and
    /// treated as "not ready yet"; a malformed response aborts the request.
    /// Cancelling `cancel` aborts with [`ProverError::Cancelled`] at the
    /// next loop edge.
    pub async fn request_proof(
        &self,
        input: &ProofInput,
        cancel: &CancellationToken,
    ) -> Result<Proof, ProverError> {
        let keys = self.api.fetch_keys().await?;
        let key = self.config.key_selection.select(&keys)?;
        debug!(key_id = %key.key_id, "sealing proof input");

        let sealed = seal_request(input, key, self.config.key_wrap, &mut rand::thread_rng())?;
        let request_id = self.api.submit(&sealed).await?;
        info!(%request_id, "proof request submitted");

        loop {
            if cancel.is_cancelled() {
                return Err(ProverError::Cancelled);
            }

            match self.api.status(&request_id).await {
                Ok(ProofStatus::Completed { proof }) => {
                    info!(%request_id, "proof completed");
                    return Ok(proof);
                }
                Ok(ProofStatus::Pending) => {
                    debug!(%request_id, "proof still pending");
                }
                Err(ProverError::Transport(e)) => {
                    // Equivalent to pending: keep the loop alive.
                    warn!(%request_id, error = %e, "transient error polling prover");
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProverError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}
