//! # celcache
//!
//! Cached evaluation of CEL expressions against JSON documents.
//!
//! Compiled programs are cached under a key built from the expression and
//! the *shape* of the document (key names and coarse value types), so a
//! program is reused across documents that declare the same variables and
//! never served against one that does not. Parsed documents are cached by
//! their raw text. Both caches are bounded by approximate memory cost.
//!
//! ## Modules
//!
//! - [`cache`] - Cost-aware caches and their metrics
//! - [`engine`] - Environments, cache keys, compilation and the pipeline
//! - [`host`] - Flat-string boundary and JSON-RPC server
//! - [`cli`] - Command line interface
//! - [`types`] - Configuration and errors
//!
//! ```ignore
//! use celcache::{Config, Evaluator};
//!
//! let evaluator = Evaluator::new(&Config::default());
//! let result = evaluator.eval_json("age >= 18.0", r#"{"age": 30}"#)?;
//! assert_eq!(result.output, "true");
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod host;
pub mod types;

pub use engine::Evaluator;
pub use types::config::Config;
pub use types::errors::{CelError, CelResult};
