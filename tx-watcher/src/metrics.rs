//! Prometheus metrics for the watcher.
//!
//! ## Metrics Exported
//!
//! - `tx_watcher_current_block` - Watermark block height (gauge)
//! - `tx_watcher_last_tx_index` - Watermark transaction index (gauge)
//! - `tx_watcher_subscribers` - Number of subscribed addresses (gauge)
//! - `tx_watcher_ticks_total` - Scanner ticks started (counter)
//! - `tx_watcher_tick_failures_total` - Scanner ticks aborted by an error (counter)
//! - `tx_watcher_transactions_scanned_total` - Transactions handed to the matcher (counter)
//! - `tx_watcher_matches_total` - Transactions recorded for a subscriber (counter)
//! - `tx_watcher_duplicates_total` - Transactions skipped as already processed (counter)
//! - `tx_watcher_malformed_total` - Transactions dropped for malformed fields (counter)
//! - `tx_watcher_api_requests_total` - API requests by route (counter)

use prometheus::{
    core::Collector, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::{matcher::MatchReport, store::WatchStore};

/// Per-process metrics registry.
pub struct WatcherMetrics {
    registry: Registry,
    pub current_block: IntGauge,
    pub last_tx_index: IntGauge,
    pub subscribers: IntGauge,
    pub ticks_total: IntCounter,
    pub tick_failures_total: IntCounter,
    pub transactions_scanned_total: IntCounter,
    pub matches_total: IntCounter,
    pub duplicates_total: IntCounter,
    pub malformed_total: IntCounter,
    pub api_requests_total: IntCounterVec,
}

impl WatcherMetrics {
    /// Create a new registry with every metric registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let current_block = IntGauge::with_opts(Opts::new(
            "tx_watcher_current_block",
            "Watermark block height",
        ))
        .expect("metric can be created");
        let last_tx_index = IntGauge::with_opts(Opts::new(
            "tx_watcher_last_tx_index",
            "Watermark transaction index",
        ))
        .expect("metric can be created");
        let subscribers = IntGauge::with_opts(Opts::new(
            "tx_watcher_subscribers",
            "Number of subscribed addresses",
        ))
        .expect("metric can be created");
        let ticks_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_ticks_total",
            "Scanner ticks started",
        ))
        .expect("metric can be created");
        let tick_failures_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_tick_failures_total",
            "Scanner ticks aborted by an error",
        ))
        .expect("metric can be created");
        let transactions_scanned_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_transactions_scanned_total",
            "Transactions handed to the matcher",
        ))
        .expect("metric can be created");
        let matches_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_matches_total",
            "Transactions recorded for a subscriber",
        ))
        .expect("metric can be created");
        let duplicates_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_duplicates_total",
            "Transactions skipped as already processed",
        ))
        .expect("metric can be created");
        let malformed_total = IntCounter::with_opts(Opts::new(
            "tx_watcher_malformed_total",
            "Transactions dropped for malformed fields",
        ))
        .expect("metric can be created");
        let api_requests_total = IntCounterVec::new(
            Opts::new("tx_watcher_api_requests_total", "API requests by route"),
            &["route"],
        )
        .expect("metric can be created");

        let collectors: [Box<dyn Collector>; 10] = [
            Box::new(current_block.clone()),
            Box::new(last_tx_index.clone()),
            Box::new(subscribers.clone()),
            Box::new(ticks_total.clone()),
            Box::new(tick_failures_total.clone()),
            Box::new(transactions_scanned_total.clone()),
            Box::new(matches_total.clone()),
            Box::new(duplicates_total.clone()),
            Box::new(malformed_total.clone()),
            Box::new(api_requests_total.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("collector can be registered");
        }

        Self {
            registry,
            current_block,
            last_tx_index,
            subscribers,
            ticks_total,
            tick_failures_total,
            transactions_scanned_total,
            matches_total,
            duplicates_total,
            malformed_total,
            api_requests_total,
        }
    }

    /// Fold a matcher report into the counters.
    pub fn record_matches(&self, scanned: usize, report: &MatchReport) {
        self.transactions_scanned_total.inc_by(scanned as u64);
        self.matches_total.inc_by(report.matched as u64);
        self.duplicates_total.inc_by(report.duplicates as u64);
        self.malformed_total.inc_by(report.malformed as u64);
    }

    pub fn record_request(&self, route: &str) {
        self.api_requests_total.with_label_values(&[route]).inc();
    }

    /// Refresh the gauges that mirror store state.
    pub fn update_from_store(&self, store: &WatchStore) {
        self.current_block.set(clamp_i64(store.current_block()));
        self.last_tx_index.set(clamp_i64(store.last_tx_index()));
        self.subscribers.set(clamp_i64(store.subscriber_count() as u64));
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for WatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    #[test]
    fn test_encode_contains_metrics() {
        let metrics = WatcherMetrics::new();
        metrics.ticks_total.inc();
        metrics.record_request("current_block");

        let text = metrics.encode().unwrap();
        assert!(text.contains("tx_watcher_ticks_total 1"));
        assert!(text.contains("tx_watcher_api_requests_total{route=\"current_block\"} 1"));
    }

    #[test]
    fn test_record_matches() {
        let metrics = WatcherMetrics::new();
        let report = MatchReport {
            matched: 2,
            duplicates: 1,
            malformed: 3,
        };
        metrics.record_matches(10, &report);

        assert_eq!(metrics.transactions_scanned_total.get(), 10);
        assert_eq!(metrics.matches_total.get(), 2);
        assert_eq!(metrics.duplicates_total.get(), 1);
        assert_eq!(metrics.malformed_total.get(), 3);
    }

    #[test]
    fn test_update_from_store() {
        let metrics = WatcherMetrics::new();
        let store = WatchStore::new();
        store.set_current_block(42);
        store.set_last_tx_index(3);
        store.add_subscriber(Address::new("0xabc"));

        metrics.update_from_store(&store);

        assert_eq!(metrics.current_block.get(), 42);
        assert_eq!(metrics.last_tx_index.get(), 3);
        assert_eq!(metrics.subscribers.get(), 1);
    }
}
