//! Query facade over the watch store, used by the HTTP API.

use std::sync::Arc;

use crate::{
    address::{Address, AddressError},
    store::WatchStore,
    transaction::Transaction,
};

/// Read and subscribe access for API callers.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<WatchStore>,
}

impl QueryService {
    pub fn new(store: Arc<WatchStore>) -> Self {
        Self { store }
    }

    /// Last processed block, 0 before the first tick.
    pub fn current_block(&self) -> u64 {
        self.store.current_block()
    }

    /// Start watching `address`. Subscribing an address twice is a no-op.
    pub fn subscribe(&self, address: &str) -> Result<(), AddressError> {
        let address = Address::parse(address)?;
        self.store.add_subscriber(address);
        Ok(())
    }

    /// Transactions matched for `address`.
    ///
    /// Returns `Ok(None)` when the address is not subscribed and
    /// `Ok(Some(..))`, possibly empty, when it is.
    pub fn transactions(&self, address: &str) -> Result<Option<Vec<Transaction>>, AddressError> {
        let address = Address::parse(address)?;
        let transactions = self.store.transactions(&address);
        if transactions.is_none() {
            tracing::debug!("Address {} is not subscribed", address);
        }
        Ok(transactions)
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    pub fn store(&self) -> &Arc<WatchStore> {
        &self.store
    }
}
