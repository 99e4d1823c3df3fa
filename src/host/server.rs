//! JSON-RPC server exposing the evaluator over stdio.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::engine::Evaluator;
use crate::types::config::Config;
use crate::types::errors::CelError;
use crate::CelResult;

use super::boundary::{CLEARED, INITIALIZED};
use super::protocol::{
    CheckParams, CheckResult, EvalJsonParams, EvalParams, EvaluationResult, InitCachesParams,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, StatusResult,
};
use super::transport::{LineTransport, StdioTransport};

/// Serves evaluation requests until EOF or `shutdown`.
pub struct HostServer {
    evaluator: Arc<Evaluator>,
    running: bool,
}

impl HostServer {
    pub fn new(config: Config) -> CelResult<Self> {
        config.validate()?;
        Ok(Self::with_evaluator(Arc::new(Evaluator::new(&config))))
    }

    /// Server over an existing evaluator.
    pub fn with_evaluator(evaluator: Arc<Evaluator>) -> Self {
        Self {
            evaluator,
            running: false,
        }
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    /// Runs the server on stdin and stdout.
    pub async fn run(&mut self) -> CelResult<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Runs the request loop on any transport.
    pub async fn serve<R: BufRead, W: Write>(
        &mut self,
        transport: &mut LineTransport<R, W>,
    ) -> CelResult<()> {
        tracing::info!("celcache server starting");
        self.running = true;

        while self.running {
            let request = match transport.read_message() {
                Ok(Some(request)) => request,
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(CelError::Json(e)) => {
                    tracing::warn!(error = %e, "Unparseable message");
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response) {
                        tracing::error!(error = %e, "Failed to write response");
                    }
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read message");
                    break;
                }
            };

            let is_notification = request.is_notification();
            let response = self.handle_request(request).await;

            if !is_notification {
                if let Err(e) = transport.write_response(&response) {
                    tracing::error!(error = %e, "Failed to write response");
                }
            }
        }

        self.running = false;
        tracing::info!("celcache server stopped");
        Ok(())
    }

    /// Dispatches one request.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "Handling request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(request.id, JsonRpcError::invalid_request());
        }

        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let outcome = match method.as_str() {
            "init_caches" => self.handle_init_caches(params),
            "eval" => self.handle_eval(params).await,
            "eval_json" => self.handle_eval_json(params).await,
            "check" => self.handle_check(params).await,
            "cache_stats" => Ok(self.evaluator.stats().to_flat_json()),
            "cache_clear" => {
                self.evaluator.clear();
                to_result(StatusResult::new(CLEARED))
            }
            "shutdown" => {
                tracing::info!("Client requested shutdown");
                self.running = false;
                Ok(Value::Null)
            }
            _ => Err(JsonRpcError::method_not_found(&method)),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    fn handle_init_caches(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitCachesParams = parse_params(params)?;
        self.evaluator
            .reconfigure(params.program_cache_mb, params.json_cache_mb)
            .map_err(|e| JsonRpcError::evaluation(&e))?;
        to_result(StatusResult::new(INITIALIZED))
    }

    async fn handle_eval(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: EvalParams = parse_params(params)?;
        let evaluator = Arc::clone(&self.evaluator);
        let evaluation = blocking(move || evaluator.eval(&params.expression, &params.payload)).await?;
        to_result(EvaluationResult::from(evaluation))
    }

    async fn handle_eval_json(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: EvalJsonParams = parse_params(params)?;
        let raw = params.raw_json();
        let evaluator = Arc::clone(&self.evaluator);
        let evaluation = blocking(move || evaluator.eval_json(&params.expression, &raw)).await?;
        to_result(EvaluationResult::from(evaluation))
    }

    async fn handle_check(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CheckParams = parse_params(params)?;
        let evaluator = Arc::clone(&self.evaluator);
        let outcome = blocking(move || evaluator.check(&params.expression)).await?;
        to_result(CheckResult::from(outcome))
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_result<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Runs an evaluator call on the blocking pool.
async fn blocking<T, F>(call: F) -> Result<T, JsonRpcError>
where
    T: Send + 'static,
    F: FnOnce() -> CelResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(JsonRpcError::evaluation(&e)),
        Err(e) => {
            tracing::error!(error = %e, "Evaluation task failed");
            Err(JsonRpcError::internal_error(format!("Evaluation task failed: {}", e)))
        }
    }
}
