//! JSON-RPC 2.0 message types.
//!
//! Requests carry a UUID `id` rendered as a string. The node echoes it back
//! in the matching response. Event notifications use the `id` `"0"` and
//! carry a [`ChainEvent`] as their result.
//!
//! Byte fields (`data`, `encoded_body`) are base64 strings on the wire.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Protocol version sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// `id` the node uses for event notifications.
pub const EVENT_ID: &str = "0";

// ============================================================================
// RpcRequest
// ============================================================================

/// A JSON-RPC request.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "method": "nonce",
///   "params": { "key": "0A1B..." },
///   "id": "uuid"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
    /// Correlation ID.
    pub id: RequestId,
}

impl RpcRequest {
    /// Creates a request with a fresh ID.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id: RequestId::generate(),
        }
    }
}

// ============================================================================
// RpcResponse
// ============================================================================

/// A message received from the node.
///
/// # Format
///
/// Success:
/// ```json
/// { "jsonrpc": "2.0", "id": "uuid", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "jsonrpc": "2.0", "id": "uuid", "error": { "code": -32603, "message": "...", "data": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Correlation ID as sent by the node.
    #[serde(default)]
    pub id: Value,

    /// Result value (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    /// Error code. Nodes send numbers or strings.
    #[serde(default)]
    pub code: Value,

    /// Short description.
    #[serde(default)]
    pub message: String,

    /// Additional detail.
    #[serde(default)]
    pub data: Value,
}

impl RpcResponse {
    /// Returns `true` if this message is an event notification.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.id.as_str() == Some(EVENT_ID)
    }

    /// Returns the request this message answers, if it answers one.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        serde_json::from_value(self.id.clone()).ok()
    }

    /// Extracts the result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the node reported an error.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::rpc(
                render(&error.code),
                error.message,
                render(&error.data),
            )),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Nonce Query
// ============================================================================

/// Parameters of the `nonce` method.
#[derive(Debug, Clone, Serialize)]
pub struct NonceParams<'a> {
    /// Uppercase hex identifier of the public key.
    pub key: &'a str,
}

/// Result of the `nonce` method. Nodes encode it as a number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NonceValue {
    /// JSON number.
    Number(u64),
    /// Decimal string.
    Text(String),
}

impl NonceValue {
    /// Returns the nonce as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the string form is not a decimal
    /// `u64`.
    pub fn into_u64(self) -> Result<u64> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::transport(format!("Invalid nonce '{s}'"))),
        }
    }
}

// ============================================================================
// Transaction Commit
// ============================================================================

/// Result of the `broadcast_tx_commit` method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastTxResult {
    /// Transaction hash.
    #[serde(default)]
    pub hash: String,

    /// Block height the transaction was committed at.
    #[serde(default)]
    pub height: Value,

    /// Mempool admission result.
    #[serde(default)]
    pub check_tx: TxResult,

    /// Block execution result.
    #[serde(default)]
    pub deliver_tx: TxResult,
}

impl BroadcastTxResult {
    /// Fails with the first non-zero result code, `check_tx` before
    /// `deliver_tx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TxCommit`] carrying the failing code and log.
    pub fn ensure_committed(&self) -> Result<()> {
        for result in [&self.check_tx, &self.deliver_tx] {
            if result.code != 0 {
                return Err(Error::tx_commit(result.code, result.log.clone()));
            }
        }
        Ok(())
    }

    /// Returns the commit height as an integer, if the node reported one.
    #[must_use]
    pub fn height(&self) -> Option<u64> {
        match &self.height {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Outcome of one transaction processing phase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxResult {
    /// Zero on success.
    #[serde(default)]
    pub code: u32,

    /// Error message for a non-zero code.
    #[serde(default)]
    pub log: String,

    /// Base64 result data.
    #[serde(default)]
    pub data: Option<String>,
}

impl TxResult {
    /// Decodes the result data. Missing data decodes as empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the data is not valid base64.
    pub fn data(&self) -> Result<Vec<u8>> {
        decode_base64(self.data.as_deref())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event emitted by a contract, delivered to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChainEvent {
    /// Topics the event was published under.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Address of the account that called the contract.
    #[serde(default)]
    pub caller: Value,

    /// Address of the emitting contract.
    #[serde(default)]
    pub address: Value,

    /// Block height the event was emitted at.
    #[serde(default)]
    pub block_height: Value,

    /// Base64 event body.
    #[serde(default)]
    pub encoded_body: Option<String>,
}

impl ChainEvent {
    /// Decodes the event body. A missing body decodes as empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the body is not valid base64.
    pub fn body(&self) -> Result<Vec<u8>> {
        decode_base64(self.encoded_body.as_deref())
    }
}

/// Parameters of the `subevents` method.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeParams<'a> {
    /// Topics to receive events for.
    pub topics: &'a [String],
}

/// Encodes transaction bytes for `broadcast_tx_commit`.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    Base64Standard.encode(bytes)
}

fn decode_base64(encoded: Option<&str>) -> Result<Vec<u8>> {
    match encoded {
        Some(encoded) => Base64Standard
            .decode(encoded)
            .map_err(|e| Error::transport(format!("Invalid base64 data: {e}"))),
        None => Ok(Vec::new()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest::new("nonce", json!({ "key": "ABCD" }));
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "nonce");
        assert_eq!(value["params"]["key"], "ABCD");
        assert_eq!(value["id"], request.id.to_string());
    }

    #[test]
    fn test_response_success() {
        let id = RequestId::generate();
        let text = format!(r#"{{"jsonrpc":"2.0","id":"{id}","result":{{"height":7}}}}"#);
        let response: RpcResponse = serde_json::from_str(&text).expect("parse");

        assert_eq!(response.request_id(), Some(id));
        assert_eq!(response.into_result().expect("result")["height"], 7);
    }

    #[test]
    fn test_response_without_result_is_null() {
        let response: RpcResponse = serde_json::from_str(r#"{"id":"x"}"#).expect("parse");
        assert_eq!(response.into_result().expect("result"), Value::Null);
    }

    #[test]
    fn test_response_error() {
        let text = r#"{"jsonrpc":"2.0","id":"0","error":{"code":-32603,"message":"Internal error","data":"no key"}}"#;
        let response: RpcResponse = serde_json::from_str(text).expect("parse");

        match response.into_result() {
            Err(Error::Rpc {
                code,
                message,
                data,
            }) => {
                assert_eq!(code, "-32603");
                assert_eq!(message, "Internal error");
                assert_eq!(data, "no key");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_event_id_is_not_a_request() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"0","result":{}}"#).expect("parse");
        assert_eq!(response.request_id(), None);

        let response: RpcResponse = serde_json::from_str(r#"{"result":{}}"#).expect("parse");
        assert_eq!(response.request_id(), None);
    }

    #[test]
    fn test_event_id_is_event() {
        let event: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"0","result":{}}"#).expect("parse");
        assert!(event.is_event());

        let response: RpcResponse =
            serde_json::from_value(json!({ "id": RequestId::generate() })).expect("parse");
        assert!(!response.is_event());

        let numeric: RpcResponse = serde_json::from_str(r#"{"id":0}"#).expect("parse");
        assert!(!numeric.is_event());
    }

    #[test]
    fn test_broadcast_result_codes() {
        let ok: BroadcastTxResult = serde_json::from_value(json!({
            "hash": "AB12",
            "height": "17",
            "check_tx": { "code": 0 },
            "deliver_tx": { "code": 0, "data": "AQID" }
        }))
        .expect("parse");
        ok.ensure_committed().expect("committed");
        assert_eq!(ok.height(), Some(17));
        assert_eq!(ok.deliver_tx.data().expect("data"), vec![1, 2, 3]);

        let rejected: BroadcastTxResult = serde_json::from_value(json!({
            "check_tx": { "code": 1, "log": "sequence number does not match" },
            "deliver_tx": { "code": 5, "log": "not reached" }
        }))
        .expect("parse");
        let err = rejected.ensure_committed().unwrap_err();
        assert!(err.is_invalid_nonce());

        let failed: BroadcastTxResult = serde_json::from_value(json!({
            "deliver_tx": { "code": 5, "log": "contract panicked" }
        }))
        .expect("parse");
        assert!(matches!(
            failed.ensure_committed(),
            Err(Error::TxCommit { code: 5, ref log }) if log == "contract panicked"
        ));
    }

    #[test]
    fn test_chain_event_body() {
        let event: ChainEvent = serde_json::from_value(json!({
            "topics": ["contract:transfer"],
            "block_height": "9",
            "encoded_body": encode_base64(b"payload")
        }))
        .expect("parse");

        assert_eq!(event.topics, vec!["contract:transfer".to_string()]);
        assert_eq!(event.body().expect("body"), b"payload");
        assert_eq!(ChainEvent::default().body().expect("empty"), Vec::<u8>::new());

        let bad = ChainEvent {
            encoded_body: Some("***".to_string()),
            ..ChainEvent::default()
        };
        assert!(matches!(bad.body(), Err(Error::Transport { .. })));
    }

    #[test]
    fn test_nonce_value_forms() {
        let number: NonceValue = serde_json::from_value(json!(41)).expect("number");
        let text: NonceValue = serde_json::from_value(json!("42")).expect("string");

        assert_eq!(number.into_u64().expect("u64"), 41);
        assert_eq!(text.into_u64().expect("u64"), 42);

        let bad: NonceValue = serde_json::from_value(json!("forty")).expect("string");
        assert!(matches!(bad.into_u64(), Err(Error::Transport { .. })));
    }
}
