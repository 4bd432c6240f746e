//! Injected key-value persistence.
//!
//! Two independent namespaces are wired into the wallet: an ephemeral
//! session store (OAuth correlation token) and a durable store (wallet
//! records keyed by address). Both tolerate corrupted or missing values by
//! resetting to an empty default instead of raising.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use zksw_common::ActivationState;

/// Session-store key holding the OAuth correlation token.
pub const SESSION_CORRELATION_KEY: &str = "oauth_state";

/// Simple string key-value store.
///
/// Implementations are infallible at this interface: a backing failure is
/// handled by the implementation (self-healing to the empty default), never
/// surfaced to the wallet.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn remove(&self, key: &str);
    async fn clear(&self);
}

/// In-memory store, the test substitute and the default session namespace.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Durable record for a wallet's signing identity, keyed by address.
///
/// Written at key derivation time (so the key survives a dropped session)
/// with the wallet still `Fresh`; the activation field flips exactly once,
/// after the first successful submission carrying the activation payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// The identity token in force when the record was written.
    pub token: String,
    /// Hex-encoded signing-key seed.
    pub seed: String,
    pub activation: ActivationState,
}

/// Typed read that self-heals: a value that fails to parse is removed and
/// treated as absent.
pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding corrupted stored value");
            store.remove(key).await;
            None
        }
    }
}
