//! JSON-RPC 2.0 message types and the parameter and result shapes of the
//! host methods.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{CheckOutcome, Evaluation, Route};
use crate::types::errors::CelError;

// ═══════════════════════════════════════════════════════════════════════════
// Error codes
// ═══════════════════════════════════════════════════════════════════════════

/// Invalid JSON.
pub const PARSE_ERROR: i32 = -32700;

/// Malformed JSON-RPC message.
pub const INVALID_REQUEST: i32 = -32600;

/// Unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Missing or mistyped parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// Failure inside the server itself.
pub const INTERNAL_ERROR: i32 = -32603;

/// The caller's expression or document could not be evaluated.
pub const EVALUATION_ERROR: i32 = -32000;

// ═══════════════════════════════════════════════════════════════════════════
// JSON-RPC envelope
// ═══════════════════════════════════════════════════════════════════════════

/// Request id, a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
}

impl From<i64> for JsonRpcId {
    fn from(n: i64) -> Self {
        JsonRpcId::Number(n)
    }
}

impl From<String> for JsonRpcId {
    fn from(s: String) -> Self {
        JsonRpcId::String(s)
    }
}

impl From<&str> for JsonRpcId {
    fn from(s: &str) -> Self {
        JsonRpcId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 request. Without an id it is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,

    pub method: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, id: Option<JsonRpcId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    /// Null only when the request could not be parsed.
    pub id: Option<JsonRpcId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Tags an evaluation failure with its kind and, for compilation
    /// failures, the undeclared variables.
    pub fn evaluation(error: &CelError) -> Self {
        let undeclared = match error {
            CelError::Compile { undeclared, .. } => undeclared.clone(),
            _ => Vec::new(),
        };
        let code = if error.is_evaluation_error() {
            EVALUATION_ERROR
        } else {
            INVALID_PARAMS
        };
        Self::new(code, error.to_string()).with_data(json!({
            "kind": error.kind(),
            "undeclared": undeclared,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Method parameters
// ═══════════════════════════════════════════════════════════════════════════

/// Parameters of `init_caches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitCachesParams {
    pub program_cache_mb: u64,
    pub json_cache_mb: u64,
}

/// Parameters of `eval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalParams {
    pub expression: String,

    #[serde(default)]
    pub payload: String,
}

/// Parameters of `eval_json`. The document may be sent as JSON text or as
/// an inline object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalJsonParams {
    pub expression: String,

    #[serde(default)]
    pub json: Option<Value>,
}

impl EvalJsonParams {
    /// Raw document text handed to the evaluator.
    pub fn raw_json(&self) -> String {
        match &self.json {
            None => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Parameters of `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckParams {
    pub expression: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// Method results
// ═══════════════════════════════════════════════════════════════════════════

/// Result of `eval` and `eval_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub value: String,
    pub route: Route,
}

impl From<Evaluation> for EvaluationResult {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            value: evaluation.output,
            route: evaluation.route,
        }
    }
}

/// Result of `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub valid: bool,
    pub with_declarations: bool,
}

impl From<CheckOutcome> for CheckResult {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            valid: true,
            with_declarations: outcome.with_declarations(),
        }
    }
}

/// Result of `init_caches` and `cache_clear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: String,
}

impl StatusResult {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
