//! Concurrent address matching over a batch of transactions.
//!
//! A batch is handed to a fixed pool of worker threads through a
//! zero-capacity (rendezvous) channel: the producer blocks until a worker
//! takes each transaction, so no more than `workers` transactions are in
//! flight regardless of batch size. [`Matcher::dispatch`] returns once every
//! worker has drained the closed channel and exited.

use crossbeam_channel::Receiver;
use std::{ops::AddAssign, sync::Arc, thread};

use crate::{address::Address, store::WatchStore, transaction::Transaction};

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 10;

/// What happened to each transaction of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Transactions recorded for a subscriber
    pub matched: usize,
    /// Transactions at or before the watermark, skipped
    pub duplicates: usize,
    /// Transactions dropped because height or index could not be decoded
    pub malformed: usize,
}

impl AddAssign for MatchReport {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.duplicates += other.duplicates;
        self.malformed += other.malformed;
    }
}

/// Outcome for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchOutcome {
    Recorded(Address),
    Unmatched,
    Duplicate,
    Malformed,
}

/// Fans batches out to a pool of matching workers.
pub struct Matcher {
    store: Arc<WatchStore>,
    workers: usize,
}

impl Matcher {
    /// Create a matcher. A pool of zero workers is raised to one, since the
    /// rendezvous handoff would otherwise never complete.
    pub fn new(store: Arc<WatchStore>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Match every transaction of `batch` against the subscriber registry.
    ///
    /// Blocks until all workers have finished. The watermark is not touched
    /// here; the caller advances it once this returns.
    pub fn dispatch(&self, batch: &[Transaction]) -> MatchReport {
        let (sender, receiver) = crossbeam_channel::bounded::<&Transaction>(0);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let receiver = receiver.clone();
                    scope.spawn(move || self.drain(receiver))
                })
                .collect();
            drop(receiver);

            for tx in batch {
                // Only fails once every worker is gone
                if sender.send(tx).is_err() {
                    tracing::error!("All matcher workers exited before the batch was drained");
                    break;
                }
            }
            drop(sender);

            let mut report = MatchReport::default();
            for handle in handles {
                match handle.join() {
                    Ok(worker_report) => report += worker_report,
                    Err(_) => tracing::error!("Matcher worker panicked"),
                }
            }
            report
        })
    }

    /// Worker loop: runs until the channel is closed and empty.
    fn drain(&self, receiver: Receiver<&Transaction>) -> MatchReport {
        let mut report = MatchReport::default();
        for tx in receiver.iter() {
            match self.match_transaction(tx) {
                MatchOutcome::Recorded(address) => {
                    tracing::info!("Match found: address {} tx {}", address, tx.hash);
                    report.matched += 1;
                }
                MatchOutcome::Duplicate => report.duplicates += 1,
                MatchOutcome::Malformed => report.malformed += 1,
                MatchOutcome::Unmatched => {}
            }
        }
        report
    }

    fn match_transaction(&self, tx: &Transaction) -> MatchOutcome {
        let position = match tx.position() {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!("Dropping transaction {}: {}", tx.hash, e);
                return MatchOutcome::Malformed;
            }
        };

        // Live watermark reads, not a snapshot from before the batch
        if position.block == self.store.current_block()
            && position.index <= self.store.last_tx_index()
        {
            return MatchOutcome::Duplicate;
        }

        // Sender first; the recipient is only consulted when the sender is
        // not subscribed.
        for address in std::iter::once(&tx.from).chain(tx.to.as_ref()) {
            if self.store.record(address, tx) {
                return MatchOutcome::Recorded(address.clone());
            }
        }

        MatchOutcome::Unmatched
    }
}
