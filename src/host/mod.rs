//! Host surfaces for the evaluator.
//!
//! - [`Boundary`] flattens every result to a single string, for callers that
//!   can only exchange text.
//! - [`HostServer`] speaks newline-delimited JSON-RPC 2.0 on stdio and keeps
//!   results and failures tagged.
//!
//! ```ignore
//! use celcache::host::HostServer;
//! use celcache::types::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load_or_default();
//!     let mut server = HostServer::new(config).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

mod boundary;
mod protocol;
mod server;
mod transport;

pub use boundary::{flatten, is_error, Boundary, CLEARED, ERROR_PREFIX, INITIALIZED};
pub use protocol::{
    CheckParams, CheckResult, EvalJsonParams, EvalParams, EvaluationResult, InitCachesParams,
    JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, StatusResult, EVALUATION_ERROR,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use server::HostServer;
pub use transport::{LineTransport, StdioTransport};
