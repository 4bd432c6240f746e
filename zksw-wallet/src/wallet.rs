//! The wallet state machine.
//!
//! `LoggedOut → AwaitingCallback → Ready(fresh | activated)`. Login hands
//! the caller a redirect URL carrying a random correlation token; the
//! callback validates the token, exchanges the authorization code, resolves
//! the wallet address, and decides between restoring a persisted signing
//! key (with whatever activation state its record carries) and deriving a
//! fresh one. While the wallet is fresh a background task pre-computes the
//! activation proof. Spends then pick the activation-inclusive or
//! spend-only path from the activation state.

use std::sync::{Arc, Mutex as StdMutex};

use rand::RngCore;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zksw_common::{ActivationState, AssetMap, Output, Proof, ProofInput, Utxo};
use zksw_prover_client::{ProverApi, ProverClient};

use crate::backend::{ActivationTxRequest, Backend, SpendTxRequest, SubmitResult};
use crate::config::WalletConfig;
use crate::events::WalletEvent;
use crate::identity::{IdentityToken, KeyMaterial, SigningIdentity};
use crate::ledger::LedgerToolkit;
use crate::oauth::OauthProvider;
use crate::storage::{get_json, KvStore, WalletRecord, SESSION_CORRELATION_KEY};
use crate::tx::{check_affordable, native_balance, plan_direct, total_requested};
use crate::watcher::watch_confirmation;
use crate::WalletError;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const CORRELATION_TOKEN_LEN: usize = 32;

/// Collaborators injected into the wallet.
pub struct WalletHandles {
    pub oauth: Arc<dyn OauthProvider>,
    pub backend: Arc<dyn Backend>,
    pub toolkit: Arc<dyn LedgerToolkit>,
    pub prover: Arc<ProverClient<Arc<dyn ProverApi>>>,
    /// Ephemeral namespace: OAuth correlation token.
    pub session: Arc<dyn KvStore>,
    /// Durable namespace: wallet records keyed by address.
    pub storage: Arc<dyn KvStore>,
}

enum SessionState {
    LoggedOut,
    AwaitingCallback,
    Ready(ReadyState),
}

struct ReadyState {
    identity: SigningIdentity,
    address: String,
    activation: ActivationState,
}

/// Proof pre-computation slot. At most one computation is in flight per
/// wallet instance.
enum ProofSlot {
    Idle,
    InFlight,
    Ready(Proof),
}

pub struct Wallet {
    config: WalletConfig,
    oauth: Arc<dyn OauthProvider>,
    backend: Arc<dyn Backend>,
    toolkit: Arc<dyn LedgerToolkit>,
    prover: Arc<ProverClient<Arc<dyn ProverApi>>>,
    session: Arc<dyn KvStore>,
    storage: Arc<dyn KvStore>,
    state: RwLock<SessionState>,
    proof_slot: Arc<RwLock<ProofSlot>>,
    events: broadcast::Sender<WalletEvent>,
    /// Root token for this instance's background loops; replaced on logout.
    cancel: StdMutex<CancellationToken>,
    /// Spend requests are serialized: concurrent spends against one wallet
    /// instance are out of contract.
    spend_lock: Mutex<()>,
}

impl Wallet {
    pub fn new(config: WalletConfig, handles: WalletHandles) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            oauth: handles.oauth,
            backend: handles.backend,
            toolkit: handles.toolkit,
            prover: handles.prover,
            session: handles.session,
            storage: handles.storage,
            state: RwLock::new(SessionState::LoggedOut),
            proof_slot: Arc::new(RwLock::new(ProofSlot::Idle)),
            events,
            cancel: StdMutex::new(CancellationToken::new()),
            spend_lock: Mutex::new(()),
        }
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Begin a login: generate and persist a fresh correlation token and
    /// return the identity provider's redirect URL.
    pub async fn login_url(&self) -> String {
        let mut bytes = [0u8; CORRELATION_TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let correlation = hex::encode(bytes);

        self.session
            .set(SESSION_CORRELATION_KEY, correlation.clone())
            .await;
        *self.state.write().await = SessionState::AwaitingCallback;
        self.oauth.auth_url(&correlation)
    }

    /// Complete the login from the identity provider's callback.
    ///
    /// Any failure leaves the machine in `LoggedOut`. A mismatched `state`
    /// parameter is rejected before any collaborator is called.
    pub async fn complete_login(
        &self,
        state_param: &str,
        code: Option<&str>,
    ) -> Result<String, WalletError> {
        let result = self.try_complete_login(state_param, code).await;
        if result.is_err() {
            *self.state.write().await = SessionState::LoggedOut;
        }
        result
    }

    async fn try_complete_login(
        &self,
        state_param: &str,
        code: Option<&str>,
    ) -> Result<String, WalletError> {
        let stored = self
            .session
            .get(SESSION_CORRELATION_KEY)
            .await
            .ok_or(WalletError::MissingCorrelation)?;
        if stored != state_param {
            return Err(WalletError::CorrelationMismatch);
        }
        let code = match code {
            Some(c) if !c.is_empty() => c,
            _ => return Err(WalletError::MissingAuthorizationCode),
        };

        let raw = self.oauth.exchange_code(code).await?;
        let token = IdentityToken::parse(&raw)?;
        let address = self.backend.resolve_address(token.user_id()).await?;

        // Correlation tokens are one-time.
        self.session.remove(SESSION_CORRELATION_KEY).await;

        let restored = self.restore_keys(&address).await;
        let (keys, activation) = match restored {
            Some((keys, activation)) => (keys, activation),
            None => {
                let keys = KeyMaterial::generate(&mut rand::thread_rng());
                // Persisted before first use so the key survives a dropped
                // session, still marked fresh: activation is recorded only
                // when the activation submission actually succeeds.
                let record = WalletRecord {
                    token: raw.clone(),
                    seed: hex::encode(keys.seed()),
                    activation: ActivationState::Fresh,
                };
                self.storage
                    .set(
                        &address,
                        serde_json::to_string(&record)
                            .map_err(|e| WalletError::InvalidToken(e.to_string()))?,
                    )
                    .await;
                (keys, ActivationState::Fresh)
            }
        };

        if activation.is_fresh() {
            // Start computing the activation proof now so it is likely
            // ready by the time the first spend is requested.
            self.spawn_proof_precompute(&token, &keys).await;
        }

        info!(%address, activation = %activation, "wallet initialized");
        *self.state.write().await = SessionState::Ready(ReadyState {
            identity: SigningIdentity::OauthToken { token, keys },
            address: address.clone(),
            activation,
        });

        let _ = self.events.send(WalletEvent::Initialized {
            address: address.clone(),
            activation,
        });
        Ok(address)
    }

    /// Alternate deployment mode: a mnemonic-derived identity with no
    /// activation concept. Only the direct peer-to-peer path applies.
    pub async fn login_with_mnemonic(&self, phrase: &str) -> Result<String, WalletError> {
        let keys = KeyMaterial::from_mnemonic(phrase);
        let address = self
            .toolkit
            .address_for_key_hash(&keys.key_hash(), self.config.network)?;

        *self.state.write().await = SessionState::Ready(ReadyState {
            identity: SigningIdentity::Mnemonic { keys },
            address: address.clone(),
            activation: ActivationState::Activated,
        });
        let _ = self.events.send(WalletEvent::Initialized {
            address: address.clone(),
            activation: ActivationState::Activated,
        });
        Ok(address)
    }

    /// Clear all in-memory identity state and both persistence namespaces.
    /// Total and idempotent: always succeeds, twice leaves the same empty
    /// state as once.
    pub async fn logout(&self) {
        let old = {
            let mut guard = self.cancel.lock().expect("cancel lock");
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        old.cancel();

        *self.state.write().await = SessionState::LoggedOut;
        *self.proof_slot.write().await = ProofSlot::Idle;
        self.session.clear().await;
        self.storage.clear().await;

        let _ = self.events.send(WalletEvent::LoggedOut);
    }

    /// Current address, if initialized.
    pub async fn address(&self) -> Result<String, WalletError> {
        Ok(self.ready_snapshot().await?.1)
    }

    pub async fn activation_state(&self) -> Result<ActivationState, WalletError> {
        Ok(self.ready_snapshot().await?.2)
    }

    /// Balance as the sum over the currently known UTXO set. Always
    /// recomputed from a fresh fetch, never cached.
    pub async fn balance(&self) -> Result<AssetMap, WalletError> {
        let (_, address, _) = self.ready_snapshot().await?;
        let utxos = self.backend.utxos_at(&address).await?;
        let mut total = AssetMap::new();
        for utxo in &utxos {
            total.accumulate(&utxo.value);
        }
        Ok(total)
    }

    /// Spend via the backend-built path, activation-inclusive when fresh.
    pub async fn send(&self, outputs: Vec<Output>) -> Result<SubmitResult, WalletError> {
        let _guard = self.spend_lock.lock().await;

        let (identity, address, activation) = self.ready_snapshot().await?;
        let token = identity
            .token()
            .cloned()
            .ok_or(WalletError::RequiresOauthIdentity)?;
        let keys = identity.keys().clone();

        let utxos = self.backend.utxos_at(&address).await?;
        self.check_spend(&utxos, &outputs, activation)?;

        let key_hash = hex::encode(keys.key_hash());
        let tx_hex = if activation.is_fresh() {
            let proof = self.wait_for_proof(&token, &keys).await?;
            self.backend
                .build_activation_tx(&ActivationTxRequest {
                    token: token.strip_signature(),
                    key_hash,
                    proof,
                    outputs: outputs.clone(),
                })
                .await?
        } else {
            self.backend
                .build_spend_tx(&SpendTxRequest {
                    token: token.raw().to_string(),
                    key_hash,
                    outputs: outputs.clone(),
                })
                .await?
        };

        let signed = self.toolkit.sign_tx(&tx_hex, &keys)?;
        let result = self.backend.submit_tx(&signed).await?;

        if activation.is_fresh() {
            self.mark_activated(&address).await;
        }
        self.announce_submission(&result, &outputs);
        Ok(result)
    }

    /// Direct peer-to-peer send: client-side UTXO selection and change
    /// computation against the ledger toolkit, no activation concept.
    pub async fn send_direct(&self, outputs: Vec<Output>) -> Result<SubmitResult, WalletError> {
        let _guard = self.spend_lock.lock().await;

        let (identity, address, _) = self.ready_snapshot().await?;
        let keys = identity.keys().clone();

        let utxos = self.backend.utxos_at(&address).await?;
        let params = self.toolkit.fee_params();
        let plan = plan_direct(&utxos, &outputs, &address, &params)?;

        let tx_hex =
            self.toolkit
                .build_payment_tx(&plan.inputs, &plan.outputs, &plan.change, &params)?;
        let signed = self.toolkit.sign_tx(&tx_hex, &keys)?;
        let result = self.backend.submit_tx(&signed).await?;

        self.announce_submission(&result, &outputs);
        Ok(result)
    }

    // === Internals ===

    async fn ready_snapshot(
        &self,
    ) -> Result<(SigningIdentity, String, ActivationState), WalletError> {
        match &*self.state.read().await {
            SessionState::Ready(ready) => Ok((
                ready.identity.clone(),
                ready.address.clone(),
                ready.activation,
            )),
            _ => Err(WalletError::NotInitialized),
        }
    }

    async fn restore_keys(&self, address: &str) -> Option<(KeyMaterial, ActivationState)> {
        let record: WalletRecord = get_json(self.storage.as_ref(), address).await?;
        let seed_bytes = hex::decode(&record.seed).ok()?;
        let seed: [u8; 32] = seed_bytes.try_into().ok()?;
        debug!(%address, activation = %record.activation, "restored signing key from persisted record");
        Some((KeyMaterial::from_seed(seed), record.activation))
    }

    /// Affordability gate: raised before any prover or backend build call.
    fn check_spend(
        &self,
        utxos: &[Utxo],
        outputs: &[Output],
        activation: ActivationState,
    ) -> Result<(), WalletError> {
        let balance = native_balance(utxos);
        let amount = total_requested(outputs);
        let reserve = if activation.is_fresh() {
            &self.config.activation_reserve
        } else {
            &self.config.spend_reserve
        };
        check_affordable(&balance, &amount, reserve)
    }

    async fn spawn_proof_precompute(&self, token: &IdentityToken, keys: &KeyMaterial) {
        let oauth = Arc::clone(&self.oauth);
        let prover = Arc::clone(&self.prover);
        let slot = Arc::clone(&self.proof_slot);
        let events = self.events.clone();
        let cancel = self.cancel.lock().expect("cancel lock").child_token();
        let token_signature = token.signature_value();
        let key_binding = keys.key_binding();

        // Claimed before the task is spawned so a racing spend sees the
        // computation as in flight rather than starting its own.
        *self.proof_slot.write().await = ProofSlot::InFlight;

        tokio::spawn(async move {
            let issuer = match oauth.issuer_key().await {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "issuer key fetch failed, proof pre-computation aborted");
                    *slot.write().await = ProofSlot::Idle;
                    return;
                }
            };
            let input = ProofInput {
                public_exponent: issuer.exponent,
                modulus: issuer.modulus,
                token_signature,
                key_binding,
            };

            match prover.request_proof(&input, &cancel).await {
                Ok(proof) => {
                    *slot.write().await = ProofSlot::Ready(proof);
                    let _ = events.send(WalletEvent::ProofReady);
                }
                Err(zksw_prover_client::ProverError::Cancelled) => {
                    *slot.write().await = ProofSlot::Idle;
                }
                Err(e) => {
                    // A later spend re-requests inline and surfaces the
                    // real error to the caller.
                    warn!(error = %e, "proof pre-computation failed");
                    *slot.write().await = ProofSlot::Idle;
                }
            }
        });
    }

    /// Wait for the pre-computed proof, polling the slot at the configured
    /// interval. If no computation is in flight (pre-computation failed or
    /// was never started) the proof is requested inline.
    async fn wait_for_proof(
        &self,
        token: &IdentityToken,
        keys: &KeyMaterial,
    ) -> Result<Proof, WalletError> {
        let cancel = self.cancel.lock().expect("cancel lock").child_token();

        loop {
            // Snapshot the slot without holding the lock across awaits.
            let in_flight = {
                let slot = self.proof_slot.read().await;
                match &*slot {
                    ProofSlot::Ready(proof) => return Ok(proof.clone()),
                    ProofSlot::InFlight => true,
                    ProofSlot::Idle => false,
                }
            };

            if !in_flight {
                let issuer = self.oauth.issuer_key().await?;
                let input = ProofInput {
                    public_exponent: issuer.exponent,
                    modulus: issuer.modulus,
                    token_signature: token.signature_value(),
                    key_binding: keys.key_binding(),
                };
                let proof = self.prover.request_proof(&input, &cancel).await?;
                *self.proof_slot.write().await = ProofSlot::Ready(proof.clone());
                let _ = self.events.send(WalletEvent::ProofReady);
                return Ok(proof);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(WalletError::Cancelled),
                _ = tokio::time::sleep(self.config.proof_wait_interval) => {}
            }
        }
    }

    /// `Fresh → Activated`, exactly once, after the first successful
    /// submission that carried the activation payload. Persisted alongside
    /// the in-memory transition so a later login restores `Activated` only
    /// for wallets that actually activated.
    async fn mark_activated(&self, address: &str) {
        {
            let mut state = self.state.write().await;
            if let SessionState::Ready(ready) = &mut *state {
                if ready.address == address {
                    ready.activation = ActivationState::Activated;
                }
            }
        }

        if let Some(mut record) = get_json::<WalletRecord>(self.storage.as_ref(), address).await {
            record.activation = ActivationState::Activated;
            if let Ok(json) = serde_json::to_string(&record) {
                self.storage.set(address, json).await;
            }
        }
    }

    fn announce_submission(&self, result: &SubmitResult, outputs: &[Output]) {
        let _ = self.events.send(WalletEvent::TxPending {
            tx_id: result.tx_id.clone(),
        });

        // Watch the first recipient's address for the submitted id.
        let Some(first) = outputs.first() else {
            return;
        };
        let cancel = self.cancel.lock().expect("cancel lock").child_token();
        tokio::spawn(watch_confirmation(
            Arc::clone(&self.backend),
            first.address.clone(),
            result.tx_id.clone(),
            self.config.confirm_interval,
            self.config.confirm_deadline,
            cancel,
            self.events.clone(),
        ));
    }
}
