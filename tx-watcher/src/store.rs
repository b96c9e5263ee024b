//! In-memory watch state shared by the scanner and the query API.
//!
//! The store holds two independent concerns:
//!
//! - the watermark, i.e. the last fully processed block and the index of the
//!   last processed transaction within it. Each half is its own atomic, so a
//!   reader can observe one half updated before the other.
//! - the subscriber registry, mapping each subscribed address to the
//!   transactions matched for it, in match order. One reader/writer lock
//!   covers the whole registry.
//!
//! Nothing is persisted; a restart starts from an empty store.

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{address::Address, transaction::Transaction};

/// Shared watermark and subscriber registry.
#[derive(Debug, Default)]
pub struct WatchStore {
    /// Last processed block height, 0 until the first tick
    current_block: AtomicU64,

    /// Index of the last processed transaction within `current_block`
    last_tx_index: AtomicU64,

    /// Subscribed addresses and their matched transactions
    subscribers: RwLock<HashMap<Address, Vec<Transaction>>>,
}

impl WatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_block(&self) -> u64 {
        self.current_block.load(Ordering::SeqCst)
    }

    pub fn set_current_block(&self, block: u64) {
        self.current_block.store(block, Ordering::SeqCst);
    }

    pub fn last_tx_index(&self) -> u64 {
        self.last_tx_index.load(Ordering::SeqCst)
    }

    pub fn set_last_tx_index(&self, index: u64) {
        self.last_tx_index.store(index, Ordering::SeqCst);
    }

    /// Register an address. Returns `false` if it was already subscribed,
    /// in which case its history is left untouched.
    pub fn add_subscriber(&self, address: Address) -> bool {
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&address) {
            return false;
        }
        tracing::info!("Added subscriber {}", address);
        subscribers.insert(address, Vec::new());
        true
    }

    pub fn is_subscribed(&self, address: &Address) -> bool {
        self.subscribers.read().contains_key(address)
    }

    /// Append a matched transaction to a subscriber's history.
    ///
    /// Returns `false` without storing anything if the address is not
    /// subscribed.
    pub fn record(&self, address: &Address, tx: &Transaction) -> bool {
        match self.subscribers.write().get_mut(address) {
            Some(history) => {
                history.push(tx.clone());
                true
            }
            None => false,
        }
    }

    /// Copy of the transactions matched for `address`, or `None` if the
    /// address is not subscribed.
    pub fn transactions(&self, address: &Address) -> Option<Vec<Transaction>> {
        self.subscribers.read().get(address).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
