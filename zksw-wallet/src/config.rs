//! Wallet configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zksw_common::Value;

/// Ledger network the wallet operates on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

/// Tunable policy for the orchestration core.
///
/// Defaults are the deployment's fixed constants: 30s poll intervals, 5s
/// proof-availability wait, and the native-coin reserves each spending path
/// must keep above the requested amount.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    pub network: Network,
    /// Reserve required on top of the requested amount when the spend also
    /// carries the activation payload (covers script deposit + fee).
    pub activation_reserve: Value,
    /// Reserve required on top of the requested amount on the activated
    /// path (covers fee).
    pub spend_reserve: Value,
    /// Interval between checks for the pre-computed proof while a fresh
    /// spend waits on it.
    pub proof_wait_interval: Duration,
    /// Interval between confirmation-watcher polls.
    pub confirm_interval: Duration,
    /// Optional bound on confirmation watching. `None` polls indefinitely,
    /// matching the historical behavior.
    pub confirm_deadline: Option<Duration>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            activation_reserve: Value::from_u64(5_000_000),
            spend_reserve: Value::from_u64(2_000_000),
            proof_wait_interval: Duration::from_secs(5),
            confirm_interval: Duration::from_secs(30),
            confirm_deadline: None,
        }
    }
}

impl WalletConfig {
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_reserves(mut self, activation: Value, spend: Value) -> Self {
        self.activation_reserve = activation;
        self.spend_reserve = spend;
        self
    }

    pub fn with_proof_wait_interval(mut self, interval: Duration) -> Self {
        self.proof_wait_interval = interval;
        self
    }

    pub fn with_confirm_interval(mut self, interval: Duration) -> Self {
        self.confirm_interval = interval;
        self
    }

    pub fn with_confirm_deadline(mut self, deadline: Duration) -> Self {
        self.confirm_deadline = Some(deadline);
        self
    }
}
