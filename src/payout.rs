//! Payout dispatcher: polls pending payouts and drives them to a terminal
//! `sent`/`failed` state via an injected sender.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::{PayoutRow, PayoutStatus, Storage};

/// Abstract capability for sending a payout on-chain (or off-chain).
/// The concrete sender — wallet signing, RPC submission, whatever moves the
/// funds — lives outside this crate; the dispatcher only needs this seam.
#[async_trait]
pub trait PayoutSender: Send + Sync {
    async fn send(&self, address: &str, net_amount_micro: u64) -> anyhow::Result<String>;
}

pub struct PayoutDispatcher {
    storage: Arc<dyn Storage>,
    sender: Arc<dyn PayoutSender>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl PayoutDispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        sender: Arc<dyn PayoutSender>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            storage,
            sender,
            poll_interval,
            max_attempts,
        }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.process_pending().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("payout dispatcher shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn process_pending(&self) {
        let pending = match self.storage.list_pending_payouts() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to list pending payouts");
                return;
            }
        };

        for payout in pending {
            self.dispatch_one(payout).await;
        }
    }

    async fn dispatch_one(&self, payout: PayoutRow) {
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);

        loop {
            attempt += 1;
            match self.sender.send(&payout.address, payout.amount_micro).await {
                Ok(tx_hash) => {
                    if let Err(e) =
                        self.storage
                            .set_payout_status(&payout.id, PayoutStatus::Sent, Some(&tx_hash))
                    {
                        tracing::error!(payout = %payout.id, error = %e, "failed to mark payout sent");
                    } else {
                        tracing::info!(payout = %payout.id, tx_hash = %tx_hash, "payout sent");
                    }
                    return;
                }
                Err(e) => {
                    tracing::warn!(payout = %payout.id, attempt, error = %e, "payout send failed");
                    if attempt >= self.max_attempts {
                        if let Err(e) =
                            self.storage.set_payout_status(&payout.id, PayoutStatus::Failed, None)
                        {
                            tracing::error!(payout = %payout.id, error = %e, "failed to mark payout failed");
                        } else {
                            tracing::error!(payout = %payout.id, "payout marked failed after max attempts; operator reconciliation required");
                        }
                        return;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                }
            }
        }
    }
}
