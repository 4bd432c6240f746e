//! Transaction confirmation watcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::events::WalletEvent;

/// Poll the recipient address's UTXO set until a reference with the
/// submitted transaction id shows up.
///
/// Outcomes: the id appears (`TxConfirmed`), the address lookup itself
/// fails (`TxFailed`, lookup errors are terminal here, unlike prover
/// polling), or the optional deadline/cancellation fires. Without a
/// deadline the loop polls indefinitely.
pub(crate) async fn watch_confirmation(
    backend: Arc<dyn Backend>,
    address: String,
    tx_id: String,
    interval: Duration,
    deadline: Option<Duration>,
    cancel: CancellationToken,
    events: broadcast::Sender<WalletEvent>,
) {
    let started = tokio::time::Instant::now();

    loop {
        match backend.utxos_at(&address).await {
            Ok(utxos) => {
                if utxos.iter().any(|u| u.reference.tx_id == tx_id) {
                    info!(%tx_id, %address, "transaction confirmed");
                    let _ = events.send(WalletEvent::TxConfirmed { tx_id });
                    return;
                }
                debug!(%tx_id, "transaction not yet on-chain");
            }
            Err(e) => {
                warn!(%tx_id, error = %e, "address lookup failed, stopping watcher");
                let _ = events.send(WalletEvent::TxFailed {
                    tx_id,
                    error: e.to_string(),
                });
                return;
            }
        }

        if let Some(limit) = deadline {
            if started.elapsed() + interval > limit {
                let _ = events.send(WalletEvent::TxFailed {
                    tx_id,
                    error: format!("confirmation deadline of {limit:?} elapsed"),
                });
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
