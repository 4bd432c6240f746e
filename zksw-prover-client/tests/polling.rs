//! Proof-request polling behavior against a scripted prover.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use zksw_common::ProverKey;
use zksw_prover_client::{
    ProofStatus, ProverApi, ProverClient, ProverClientConfig, ProverError, SealedRequest,
};
use zksw_test_fixtures::fixtures;

/// Prover that replays a scripted sequence of status results.
struct ScriptedProver {
    key: ProverKey,
    script: Mutex<Vec<Result<ProofStatus, ProverError>>>,
    polls: AtomicUsize,
}

impl ScriptedProver {
    fn new(script: Vec<Result<ProofStatus, ProverError>>) -> Self {
        Self {
            key: fixtures().prover_key().clone(),
            script: Mutex::new(script),
            polls: AtomicUsize::new(0),
        }
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProverApi for ScriptedProver {
    async fn fetch_keys(&self) -> Result<Vec<ProverKey>, ProverError> {
        Ok(vec![self.key.clone()])
    }

    async fn submit(&self, _request: &SealedRequest) -> Result<String, ProverError> {
        Ok("req-1".to_string())
    }

    async fn status(&self, request_id: &str) -> Result<ProofStatus, ProverError> {
        assert_eq!(request_id, "req-1");
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            Ok(ProofStatus::Pending)
        } else {
            script.remove(0)
        }
    }
}

fn config() -> ProverClientConfig {
    ProverClientConfig::default().with_poll_interval(Duration::from_secs(30))
}

#[tokio::test(start_paused = true)]
async fn pending_twice_then_completed_takes_exactly_three_polls() {
    let proof = fixtures().proof().clone();
    let prover = ScriptedProver::new(vec![
        Ok(ProofStatus::Pending),
        Ok(ProofStatus::Pending),
        Ok(ProofStatus::Completed {
            proof: proof.clone(),
        }),
    ]);
    let client = ProverClient::new(prover, config());

    let started = tokio::time::Instant::now();
    let result = client
        .request_proof(&fixtures().proof_input(), &CancellationToken::new())
        .await
        .expect("proof");

    assert_eq!(result, proof);
    assert_eq!(client.api().polls(), 3);
    // Two pending results, so exactly two 30s waits between the three polls.
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn transport_errors_are_treated_as_pending() {
    let proof = fixtures().proof().clone();
    let prover = ScriptedProver::new(vec![
        Err(ProverError::Transport("connection reset".into())),
        Ok(ProofStatus::Completed {
            proof: proof.clone(),
        }),
    ]);
    let client = ProverClient::new(prover, config());

    let result = client
        .request_proof(&fixtures().proof_input(), &CancellationToken::new())
        .await
        .expect("proof despite transient error");
    assert_eq!(result, proof);
    assert_eq!(client.api().polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_response_is_fatal() {
    let prover = ScriptedProver::new(vec![Err(ProverError::Malformed("not json".into()))]);
    let client = ProverClient::new(prover, config());

    let err = client
        .request_proof(&fixtures().proof_input(), &CancellationToken::new())
        .await
        .expect_err("fatal");
    assert!(matches!(err, ProverError::Malformed(_)));
    assert_eq!(client.api().polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_an_endless_pending_loop() {
    // Empty script: every poll reports pending, forever.
    let prover = ScriptedProver::new(Vec::new());
    let client = ProverClient::new(prover, config());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(95)).await;
        canceller.cancel();
    });

    let err = client
        .request_proof(&fixtures().proof_input(), &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, ProverError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn empty_key_set_is_a_selection_error() {
    struct NoKeys;

    #[async_trait]
    impl ProverApi for NoKeys {
        async fn fetch_keys(&self) -> Result<Vec<ProverKey>, ProverError> {
            Ok(Vec::new())
        }
        async fn submit(&self, _request: &SealedRequest) -> Result<String, ProverError> {
            unreachable!("must not submit without a key")
        }
        async fn status(&self, _request_id: &str) -> Result<ProofStatus, ProverError> {
            unreachable!("must not poll without a submission")
        }
    }

    let client = ProverClient::new(NoKeys, config());
    let err = client
        .request_proof(&fixtures().proof_input(), &CancellationToken::new())
        .await
        .expect_err("no keys");
    assert!(matches!(err, ProverError::KeySelection(_)));
}
