//! Query API on an ephemeral port.

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tx_watcher::{
    api::{serve, ApiState},
    metrics::WatcherMetrics,
    QueryService, WatchStore,
};

/// A running API server backed by its own store.
pub struct TestApi {
    pub addr: SocketAddr,
    pub store: Arc<WatchStore>,
    pub metrics: Arc<WatcherMetrics>,
    cancel: CancellationToken,
}

impl TestApi {
    pub async fn start() -> Self {
        Self::with_store(Arc::new(WatchStore::new()), Arc::new(WatcherMetrics::new())).await
    }

    pub async fn with_store(store: Arc<WatchStore>, metrics: Arc<WatcherMetrics>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let state = Arc::new(ApiState::new(QueryService::new(store.clone()), metrics.clone()));

        let serve_cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = serve(listener, state, serve_cancel).await;
        });

        Self {
            addr,
            store,
            metrics,
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
