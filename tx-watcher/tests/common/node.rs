//! In-process JSON-RPC node.

use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{collections::HashMap, convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tx_watcher::{
    quantity::{format_quantity, parse_quantity},
    Transaction,
};

/// Failure the node injects into every response while set.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Answer with this HTTP status and an error body.
    Status(u16),
    /// Answer 200 with a JSON-RPC error object.
    Rpc { code: i64, message: String },
}

#[derive(Default)]
struct NodeState {
    head: u64,
    blocks: HashMap<u64, Vec<Transaction>>,
    fault: Option<Fault>,
    calls: Vec<String>,
}

/// JSON-RPC node bound to an ephemeral local port.
pub struct FakeNode {
    addr: SocketAddr,
    state: Arc<Mutex<NodeState>>,
    cancel: CancellationToken,
}

impl FakeNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(NodeState::default()));
        let cancel = CancellationToken::new();

        let accept_state = state.clone();
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(accepted) => accepted,
                        Err(_) => break,
                    },
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(|req| handle(req, state.clone()));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            addr,
            state,
            cancel,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().head = head;
    }

    pub fn add_block(&self, height: u64, transactions: Vec<Transaction>) {
        self.state.lock().blocks.insert(height, transactions);
    }

    pub fn set_fault(&self, fault: Option<Fault>) {
        self.state.lock().fault = fault;
    }

    /// Methods called so far, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<Mutex<NodeState>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let body = req.collect().await.map(|b| b.to_bytes()).unwrap_or_default();
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();

    let mut state = state.lock();
    state.calls.push(method.clone());

    let (status, payload) = match state.fault.clone() {
        Some(Fault::Status(code)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32000, "message": "node unavailable"},
            }),
        ),
        Some(Fault::Rpc { code, message }) => (
            StatusCode::OK,
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message},
            }),
        ),
        None => (StatusCode::OK, answer(&state, &method, &request["params"], id)),
    };

    let mut response = Response::new(Full::new(Bytes::from(payload.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn answer(state: &NodeState, method: &str, params: &Value, id: Value) -> Value {
    match method {
        "eth_blockNumber" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": format_quantity(state.head),
        }),
        "eth_getBlockByNumber" => {
            let block = params[0]
                .as_str()
                .and_then(|height| parse_quantity(height).ok())
                .and_then(|height| state.blocks.get(&height).map(|txs| (height, txs)))
                .map(|(height, transactions)| {
                    json!({
                        "number": format_quantity(height),
                        "transactions": transactions,
                    })
                })
                .unwrap_or(Value::Null);
            json!({"jsonrpc": "2.0", "id": id, "result": block})
        }
        other => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("method {other} not found")},
        }),
    }
}
