//! Flat-string adapter for callers that can only exchange text.
//!
//! Every operation returns a single string. Failures are flattened to
//! [`ERROR_PREFIX`] followed by the error message, whose first words name
//! the category (`JSON parsing error:`, `CEL compilation error:`, ...).

use std::sync::Arc;

use crate::engine::Evaluator;
use crate::CelResult;

/// Prefix marking a flattened failure.
pub const ERROR_PREFIX: &str = "error: ";

/// Reply of a successful `cache_clear`.
pub const CLEARED: &str = "Cache cleared successfully";

/// Reply of a successful `init_caches`.
pub const INITIALIZED: &str = "Caches initialized";

/// Turns a tagged result into boundary text.
pub fn flatten(result: CelResult<String>) -> String {
    match result {
        Ok(value) => value,
        Err(e) => format!("{}{}", ERROR_PREFIX, e),
    }
}

/// True when boundary text is a flattened failure.
pub fn is_error(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

/// The six boundary operations over a shared evaluator.
#[derive(Debug, Clone)]
pub struct Boundary {
    evaluator: Arc<Evaluator>,
}

impl Boundary {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    /// Replaces both caches with empty ones of the given budgets.
    pub fn init_caches(&self, program_cache_mb: u64, json_cache_mb: u64) -> String {
        flatten(
            self.evaluator
                .reconfigure(program_cache_mb, json_cache_mb)
                .map(|()| INITIALIZED.to_string()),
        )
    }

    pub fn eval(&self, expression: &str, payload: &str) -> String {
        flatten(self.evaluator.eval(expression, payload).map(|e| e.output))
    }

    pub fn eval_json(&self, expression: &str, json: &str) -> String {
        flatten(self.evaluator.eval_json(expression, json).map(|e| e.output))
    }

    /// `OK`, `OK (with variable declarations)` or a flattened failure.
    pub fn check(&self, expression: &str) -> String {
        flatten(
            self.evaluator
                .check(expression)
                .map(|outcome| outcome.message().to_string()),
        )
    }

    /// Flat JSON object with `program_*` and `json_*` counters.
    pub fn cache_stats(&self) -> String {
        self.evaluator.stats().to_flat_json().to_string()
    }

    pub fn cache_clear(&self) -> String {
        self.evaluator.clear();
        CLEARED.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::Config;

    fn boundary() -> Boundary {
        let mut config = Config::default();
        config.cache.program_counters = 4096;
        config.cache.json_counters = 4096;
        Boundary::new(Arc::new(Evaluator::new(&config)))
    }

    #[test]
    fn test_success_is_bare_value() {
        let boundary = boundary();
        assert_eq!(boundary.eval_json("1 + 1", "{}"), "2");
        assert_eq!(boundary.eval_json("name", r#"{"name": "John"}"#), "John");
        assert_eq!(boundary.eval("data + '!'", "hi"), "hi!");
    }

    #[test]
    fn test_failures_are_prefixed() {
        let boundary = boundary();

        let json_error = boundary.eval_json("x", "{broken");
        assert!(json_error.starts_with("error: JSON parsing error:"));

        let compile_error = boundary.eval_json("1 +", "{}");
        assert!(compile_error.starts_with("error: CEL compilation error:"));
        assert!(is_error(&compile_error));

        let eval_error = boundary.eval_json("'a' + 1", "{}");
        assert!(eval_error.starts_with("error: CEL evaluation error:"));

        let env_error = boundary.eval_json("1", r#"{"null": 1}"#);
        assert!(env_error.starts_with("error: CEL environment creation error:"));
    }

    #[test]
    fn test_check_messages() {
        let boundary = boundary();
        assert_eq!(boundary.check("1 + 1"), "OK");
        assert_eq!(boundary.check("user.role == 'admin'"), "OK (with variable declarations)");
        assert!(is_error(&boundary.check("1 +")));
    }

    #[test]
    fn test_stats_and_clear() {
        let boundary = boundary();
        boundary.eval_json("1 + 1", "{}");
        boundary.eval_json("1 + 1", "{}");

        let stats: serde_json::Value = serde_json::from_str(&boundary.cache_stats()).unwrap();
        assert_eq!(stats["program_hits"], 1);
        assert!(stats["memory_usage"].as_u64().unwrap() > 0);

        assert_eq!(boundary.cache_clear(), CLEARED);
        let stats: serde_json::Value = serde_json::from_str(&boundary.cache_stats()).unwrap();
        assert_eq!(stats["program_hits"], 0);
        assert_eq!(stats["program_entries"], 0);
    }

    #[test]
    fn test_init_caches() {
        let boundary = boundary();
        assert_eq!(boundary.init_caches(32, 16), INITIALIZED);
        let stats: serde_json::Value = serde_json::from_str(&boundary.cache_stats()).unwrap();
        assert_eq!(stats["program_max_cost"], 32 * 1024 * 1024);

        assert!(is_error(&boundary.init_caches(0, 16)));
    }
}
