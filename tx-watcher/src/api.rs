//! HTTP query API.
//!
//! Routes:
//!
//! - `GET /current-block` - last processed block
//! - `POST /subscribe` - body `{"address": "0x.."}`
//! - `GET /transactions/{address}` - transactions matched for an address
//! - `GET /health` - liveness and a short status summary
//! - `GET /metrics` - Prometheus metrics

use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{metrics::WatcherMetrics, query::QueryService, transaction::Transaction};

const TRANSACTIONS_PREFIX: &str = "/transactions/";

/// State shared by every API connection.
pub struct ApiState {
    pub query: QueryService,
    pub metrics: Arc<WatcherMetrics>,
}

impl ApiState {
    pub fn new(query: QueryService, metrics: Arc<WatcherMetrics>) -> Self {
        Self { query, metrics }
    }
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentBlockResponse {
    current_block_height: u64,
}

#[derive(Debug, Serialize)]
struct TransactionsResponse {
    address: String,
    subscribed: bool,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    msg: &'static str,
}

/// Bind `addr` and serve the API until `cancel` fires.
pub async fn start_api_server(
    addr: SocketAddr,
    state: Arc<ApiState>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, cancel).await
}

/// Serve the API on an already bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!("API server listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("API server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => accepted?,
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(|req| handle_request(req, state.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("API request: {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/current-block") => {
            state.metrics.record_request("current_block");
            json_response(
                StatusCode::OK,
                &CurrentBlockResponse {
                    current_block_height: state.query.current_block(),
                },
            )
        }
        (&Method::POST, "/subscribe") => {
            state.metrics.record_request("subscribe");
            handle_subscribe(req, &state).await
        }
        (&Method::GET, p) if p.starts_with(TRANSACTIONS_PREFIX) => {
            state.metrics.record_request("transactions");
            handle_transactions(&p[TRANSACTIONS_PREFIX.len()..], &state)
        }
        (&Method::GET, "/health") => json_response(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "currentBlock": state.query.current_block(),
                "subscribers": state.query.subscriber_count(),
            }),
        ),
        (&Method::GET, "/metrics") => {
            state.metrics.update_from_store(state.query.store());
            match state.metrics.encode() {
                Ok(text) => text_response(
                    StatusCode::OK,
                    "text/plain; version=0.0.4; charset=utf-8",
                    text,
                ),
                Err(e) => {
                    error!("Failed to encode metrics: {}", e);
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        e.to_string(),
                        "metrics unavailable",
                    )
                }
            }
        }
        _ => error_response(
            StatusCode::NOT_FOUND,
            format!("no route for {method} {path}"),
            "not found",
        ),
    };

    Ok(response)
}

async fn handle_subscribe(req: Request<Incoming>, state: &ApiState) -> Response<Full<Bytes>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string(), "failed to read body");
        }
    };

    let request: SubscribeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Error decoding subscribe request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string(), "invalid request body");
        }
    };

    match state.query.subscribe(&request.address) {
        Ok(()) => json_response(StatusCode::OK, &json!({ "subscribed": true })),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string(), "invalid address"),
    }
}

fn handle_transactions(address: &str, state: &ApiState) -> Response<Full<Bytes>> {
    match state.query.transactions(address) {
        Ok(transactions) => json_response(
            StatusCode::OK,
            &TransactionsResponse {
                address: address.to_string(),
                subscribed: transactions.is_some(),
                transactions: transactions.unwrap_or_default(),
            },
        ),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string(), "invalid address"),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(body) {
        Ok(body) => text_response(status, "application/json", body),
        Err(e) => {
            error!("Failed to encode response: {}", e);
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                r#"{"error":"encoding failed","msg":"internal error"}"#.to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, error: String, msg: &'static str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorResponse { error, msg })
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
