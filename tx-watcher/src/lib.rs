//! Transaction Watcher
//!
//! Follows an Ethereum-style JSON-RPC node and records every transaction
//! that touches a subscribed address. This library provides:
//!
//! - A periodic block scanner that tracks a `(block, transaction index)`
//!   watermark
//! - A concurrent matcher that fans each batch out to a fixed worker pool
//! - An in-memory store of subscribers and their matched transactions
//! - An HTTP query API for subscribing and reading results
//!
//! # Architecture
//!
//! On every tick the [`Scanner`] asks the node for its head, fetches the
//! blocks between the local watermark and the head and hands the batch to
//! the [`Matcher`]. Matches are appended to the [`WatchStore`], which the
//! [`QueryService`] reads on behalf of API callers.
//!
//! All state is in memory; a restart begins again from the current head.

pub mod address;
pub mod api;
pub mod client;
pub mod config;
pub mod matcher;
pub mod metrics;
pub mod quantity;
pub mod query;
pub mod scanner;
pub mod store;
pub mod transaction;

pub use address::Address;
pub use client::{JsonRpcLedgerClient, LedgerClient, LedgerError};
pub use config::WatcherConfig;
pub use matcher::{MatchReport, Matcher};
pub use query::QueryService;
pub use scanner::{ScanError, Scanner, TickSummary};
pub use store::WatchStore;
pub use transaction::{Transaction, TxPosition};
