//! Background read-back of transactions still PENDING after the payer
//! should have come back from the bank.
//!
//! Webhooks are the primary way a transaction becomes terminal. When one is
//! lost, this worker asks the processor for the transaction and applies the
//! reported status through the same monotone rule the webhook path uses.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ReconciliationConfig;
use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::StatusUpdate;
use crate::services::payment_orchestrator::PaymentOrchestrator;

/// Counts for one pass over the pending batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub examined: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub failed: usize,
}

pub struct ReconciliationWorker {
    store: Arc<dyn TransactionStore>,
    orchestrator: Arc<PaymentOrchestrator>,
    config: ReconciliationConfig,
}

impl ReconciliationWorker {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        orchestrator: Arc<PaymentOrchestrator>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            min_age_secs = self.config.min_age.as_secs(),
            batch_size = self.config.batch_size,
            "reconciliation worker started"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh process does
        // not hit the processor before serving traffic.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciliation worker stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.reconcile_pending(Utc::now()).await {
                        Ok(summary) if summary.examined > 0 => {
                            info!(
                                examined = summary.examined,
                                applied = summary.applied,
                                unchanged = summary.unchanged,
                                conflicts = summary.conflicts,
                                failed = summary.failed,
                                "reconciliation cycle finished"
                            );
                        }
                        Ok(_) => debug!("no pending transactions to reconcile"),
                        Err(e) => warn!(error = %e, "reconciliation cycle failed"),
                    }
                }
            }
        }

        info!("reconciliation worker stopped");
    }

    /// Read back every PENDING transaction older than `min_age` at `now`.
    ///
    /// A failure on one transaction is logged and counted; it never stops
    /// the rest of the batch.
    pub async fn reconcile_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationSummary, DatabaseError> {
        let min_age = chrono::Duration::from_std(self.config.min_age)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let pending = self
            .store
            .list_pending(now - min_age, self.config.batch_size)
            .await?;

        let mut summary = ReconciliationSummary::default();
        for tx in pending {
            summary.examined += 1;
            match self.orchestrator.reconcile(&tx.reference).await {
                Ok(StatusUpdate::Applied(_)) => summary.applied += 1,
                Ok(StatusUpdate::Unchanged(_)) => summary.unchanged += 1,
                Ok(StatusUpdate::Conflict { .. }) => summary.conflicts += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(reference = %tx.reference, error = %e, "read-back failed");
                }
            }
        }

        Ok(summary)
    }
}
