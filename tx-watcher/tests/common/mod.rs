//! Common test utilities for integration tests.
//!
//! Provides an in-process JSON-RPC node serving `eth_blockNumber` and
//! `eth_getBlockByNumber` from mutable state, plus a helper that runs the
//! query API on an ephemeral port.

#![allow(dead_code)]

mod api;
mod node;

pub use api::*;
pub use node::*;

use tx_watcher::{Address, Transaction};

pub const ALICE: &str = "0xa11ce0000000000000000000000000000000a11c";
pub const BOB: &str = "0xb0b0000000000000000000000000000000000b0b";
pub const CAROL: &str = "0xca401000000000000000000000000000000ca401";

/// Build a transaction at `block`/`index` from `from` to `to`.
pub fn transaction(
    hash: &str,
    from: &str,
    to: Option<&str>,
    block: u64,
    index: u64,
) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        from: Address::new(from),
        to: to.map(Address::new),
        block_number: format!("{block:#x}"),
        transaction_index: format!("{index:#x}"),
    }
}
