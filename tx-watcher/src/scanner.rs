//! Periodic block scanner.
//!
//! Each tick compares the node's chain head with the local watermark,
//! fetches every block in between, matches the resulting batch and finally
//! advances the watermark to the last transaction of the batch.
//!
//! A failed fetch aborts the tick before anything is matched or the
//! watermark moves; the same range is retried on the next tick. The very
//! first tick only looks at the current head, so history before startup is
//! never scanned.

use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{LedgerClient, LedgerError},
    matcher::{MatchReport, Matcher},
    metrics::WatcherMetrics,
    quantity::QuantityError,
    store::WatchStore,
    transaction::{Transaction, TxPosition},
};

/// Errors that abort a tick.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Fetching the head or a block failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The matcher task did not complete.
    #[error("matcher task failed: {0}")]
    Matcher(#[from] tokio::task::JoinError),

    /// The last transaction of the batch has an undecodable position.
    #[error("cannot advance watermark past transaction {hash}: {source}")]
    Watermark {
        hash: String,
        #[source]
        source: QuantityError,
    },
}

/// Result of one successful tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// First block fetched
    pub from_block: u64,
    /// Last block fetched
    pub to_block: u64,
    /// Number of transactions in the batch
    pub transactions: usize,
    /// Matcher outcome
    pub report: MatchReport,
    /// New watermark, `None` when the batch was empty
    pub watermark: Option<TxPosition>,
}

/// Drives the ingestion pipeline on a fixed interval.
pub struct Scanner<C> {
    client: C,
    store: Arc<WatchStore>,
    matcher: Arc<Matcher>,
    poll_interval: Duration,
    metrics: Arc<WatcherMetrics>,
}

impl<C: LedgerClient> Scanner<C> {
    pub fn new(
        client: C,
        store: Arc<WatchStore>,
        workers: usize,
        poll_interval: Duration,
        metrics: Arc<WatcherMetrics>,
    ) -> Self {
        let matcher = Arc::new(Matcher::new(store.clone(), workers));
        Self {
            client,
            store,
            matcher,
            poll_interval,
            metrics,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run ticks until `cancel` fires.
    ///
    /// Cancellation is only observed between ticks; a tick that has started
    /// always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            "Starting scanner (poll interval {:?}, {} workers)",
            self.poll_interval,
            self.matcher.workers()
        );

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Scanner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(summary) => {
                            if summary.report.matched > 0 {
                                tracing::info!(
                                    "Recorded {} matches from blocks {} to {}",
                                    summary.report.matched,
                                    summary.from_block,
                                    summary.to_block
                                );
                            }
                        }
                        Err(e) => tracing::error!("Scan error: {}", e),
                    }
                }
            }
        }
    }

    /// Run a single scan pass.
    pub async fn tick(&self) -> Result<TickSummary, ScanError> {
        self.metrics.ticks_total.inc();
        let result = self.scan().await;
        if result.is_err() {
            self.metrics.tick_failures_total.inc();
        }
        self.metrics.update_from_store(&self.store);
        result
    }

    async fn scan(&self) -> Result<TickSummary, ScanError> {
        let (from_block, to_block, batch) = self.collect_batch().await?;

        let matcher = self.matcher.clone();
        let (batch, report) = tokio::task::spawn_blocking(move || {
            let report = matcher.dispatch(&batch);
            (batch, report)
        })
        .await?;
        self.metrics.record_matches(batch.len(), &report);

        let watermark = self.advance_watermark(&batch)?;

        tracing::debug!(
            "Scanned blocks {} to {}: {} transactions, {:?}, watermark {:?}",
            from_block,
            to_block,
            batch.len(),
            report,
            watermark
        );

        Ok(TickSummary {
            from_block,
            to_block,
            transactions: batch.len(),
            report,
            watermark,
        })
    }

    /// Fetch the ordered batch for this tick.
    ///
    /// Returns the inclusive block range that was requested together with
    /// the concatenated transactions of every block in it.
    async fn collect_batch(&self) -> Result<(u64, u64, Vec<Transaction>), LedgerError> {
        let remote = self.client.block_number().await?;
        let local = self.store.current_block();

        let from_block = if local == 0 {
            tracing::info!("No block processed yet, starting at chain head {}", remote);
            self.store.set_current_block(remote);
            remote
        } else {
            // The watermark block is fetched again; the matcher's dedup
            // guard skips what was already processed in it.
            local
        };

        if remote < from_block {
            tracing::debug!(
                "Chain head {} is behind watermark block {}, nothing to fetch",
                remote,
                from_block
            );
        }

        let mut batch = Vec::new();
        for height in from_block..=remote {
            let transactions = self.client.block_transactions(height).await?;
            batch.extend(transactions);
        }

        Ok((from_block, remote, batch))
    }

    /// Move the watermark to the last transaction of `batch`, by position.
    fn advance_watermark(&self, batch: &[Transaction]) -> Result<Option<TxPosition>, ScanError> {
        let Some(last) = batch.last() else {
            return Ok(None);
        };

        let position = last.position().map_err(|source| ScanError::Watermark {
            hash: last.hash.clone(),
            source,
        })?;

        self.store.set_current_block(position.block);
        self.store.set_last_tx_index(position.index);

        Ok(Some(position))
    }
}
