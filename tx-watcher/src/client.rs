//! Ledger access over JSON-RPC.
//!
//! The scanner only needs two things from a node: the current chain head
//! and the transactions of a given block. [`LedgerClient`] captures that
//! contract; [`JsonRpcLedgerClient`] implements it against an Ethereum-style
//! JSON-RPC 2.0 endpoint (`eth_blockNumber`, `eth_getBlockByNumber`).

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;

use crate::{
    quantity::{format_quantity, parse_quantity, QuantityError},
    transaction::Transaction,
};

const JSONRPC_VERSION: &str = "2.0";

/// Errors returned by a ledger client.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The request never produced an HTTP response.
    #[error("rpc call {method}() failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// The node answered with an HTTP status of 400 or above.
    #[error("rpc call {method}() returned status {status}: {detail}")]
    Http {
        method: String,
        status: u16,
        detail: String,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("rpc call {method}() returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The response carried neither a result nor an error.
    #[error("rpc call {method}() returned no result")]
    MissingResult { method: String },

    /// The response body or result could not be decoded.
    #[error("rpc call {method}() returned an undecodable response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// A quantity in the result was not valid hex.
    #[error("invalid quantity in rpc result: {0}")]
    Quantity(#[from] QuantityError),

    /// The node does not know the requested block.
    #[error("block {0} not found")]
    BlockNotFound(u64),
}

impl LedgerError {
    /// HTTP status of the failure, when the node returned one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Read access to a remote ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Height of the chain head.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Transactions of the block at `height`, in block order.
    async fn block_transactions(&self, height: u64) -> Result<Vec<Transaction>, LedgerError>;
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockTransactions {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// [`LedgerClient`] backed by a JSON-RPC endpoint.
pub struct JsonRpcLedgerClient {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Create a client for `endpoint` with a per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue a single JSON-RPC call and return its `result`, which may be
    /// `None` when the node answered with `null`.
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| LedgerError::Transport {
                method: method.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| LedgerError::Transport {
                method: method.to_string(),
                source,
            })?;

        decode_response(method, status, &body)
    }
}

/// Interpret a JSON-RPC response body.
///
/// Client and server faults (status >= 400) take precedence over any error
/// object embedded in the body.
fn decode_response(
    method: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<Option<Value>, LedgerError> {
    let is_fault = status.as_u16() >= 400;

    let response: JsonRpcResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(source) if is_fault => {
            return Err(LedgerError::Http {
                method: method.to_string(),
                status: status.as_u16(),
                detail: format!("could not decode body to rpc response: {source}"),
            })
        }
        Err(source) => {
            return Err(LedgerError::Decode {
                method: method.to_string(),
                source,
            })
        }
    };

    if is_fault {
        let detail = match &response.error {
            Some(error) => format!("rpc response error {}: {}", error.code, error.message),
            None => "no rpc error available".to_string(),
        };
        return Err(LedgerError::Http {
            method: method.to_string(),
            status: status.as_u16(),
            detail,
        });
    }

    if let Some(error) = response.error {
        return Err(LedgerError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }

    Ok(response.result)
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        const METHOD: &str = "eth_blockNumber";

        let result = self
            .call(METHOD, json!([]))
            .await?
            .ok_or_else(|| LedgerError::MissingResult {
                method: METHOD.to_string(),
            })?;
        let number: String =
            serde_json::from_value(result).map_err(|source| LedgerError::Decode {
                method: METHOD.to_string(),
                source,
            })?;

        Ok(parse_quantity(&number)?)
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<Transaction>, LedgerError> {
        const METHOD: &str = "eth_getBlockByNumber";

        let result = self
            .call(METHOD, json!([format_quantity(height), true]))
            .await?
            .ok_or(LedgerError::BlockNotFound(height))?;
        let block: BlockTransactions =
            serde_json::from_value(result).map_err(|source| LedgerError::Decode {
                method: METHOD.to_string(),
                source,
            })?;

        tracing::debug!(
            "Fetched block {} with {} transactions",
            height,
            block.transactions.len()
        );

        Ok(block.transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":"0x1b4"}"#;
        let result = decode_response("eth_blockNumber", StatusCode::OK, body).unwrap();
        assert_eq!(result, Some(json!("0x1b4")));
    }

    #[test]
    fn test_decode_null_result() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let result = decode_response("eth_getBlockByNumber", StatusCode::OK, body).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_decode_rpc_error() {
        let body =
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
        let err = decode_response("eth_foo", StatusCode::OK, body).unwrap_err();
        match err {
            LedgerError::Rpc { code, message, .. } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_http_fault_with_rpc_error() {
        let body =
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"rate limited"}}"#;
        let err =
            decode_response("eth_blockNumber", StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_decode_http_fault_with_garbage_body() {
        let err = decode_response("eth_blockNumber", StatusCode::BAD_GATEWAY, b"<html>")
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_decode_garbage_body() {
        let err = decode_response("eth_blockNumber", StatusCode::OK, b"not json").unwrap_err();
        assert!(matches!(err, LedgerError::Decode { .. }));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_block_transactions_payload() {
        let block: BlockTransactions = serde_json::from_value(json!({
            "number": "0xa",
            "hash": "0xblock",
            "transactions": [
                {"hash": "0x1", "from": "0xabc", "to": "0xdef", "blockNumber": "0xa", "transactionIndex": "0x0"},
                {"hash": "0x2", "from": "0xdef", "to": null, "blockNumber": "0xa", "transactionIndex": "0x1"}
            ]
        }))
        .unwrap();

        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].hash, "0x1");
        assert_eq!(block.transactions[1].to, None);
    }

    #[test]
    fn test_block_with_incomplete_transaction_still_decodes() {
        let block: BlockTransactions = serde_json::from_value(json!({
            "transactions": [
                {"hash": "0x1", "from": "0xabc", "to": "0xdef", "blockNumber": "0xa", "transactionIndex": "0x0"},
                {"hash": "0x2", "from": "0xabc", "to": "0xdef", "blockNumber": "0xa"},
                {"hash": "0x3", "from": null, "to": "0xdef", "blockNumber": "0xa", "transactionIndex": "0x2"}
            ]
        }))
        .unwrap();

        assert_eq!(block.transactions.len(), 3);
        assert!(block.transactions[0].position().is_ok());
        assert!(block.transactions[1].position().is_err());
        assert!(block.transactions[2].position().is_ok());
    }
}
