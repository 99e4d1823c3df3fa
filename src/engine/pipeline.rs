//! Compile-cache-evaluate pipeline.
//!
//! [`Evaluator`] owns both caches and runs every request through the same
//! stages: fetch or parse the document, try the fast path, derive the
//! structural key, fetch or compile the program, execute, format.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::environment::{CompilationContext, ParsedEnvironment};
use super::fast_path;
use super::format::render;
use super::key::StructuralKey;
use super::program::CompiledProgram;
use crate::cache::{CacheReport, CostCache};
use crate::types::config::{CacheConfig, Config};
use crate::CelResult;

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Direct field lookup, nothing compiled.
    FastPath,
    /// Program served from the cache.
    CachedProgram,
    /// Program compiled for this call.
    CompiledProgram,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::FastPath => write!(f, "fast_path"),
            Route::CachedProgram => write!(f, "cached_program"),
            Route::CompiledProgram => write!(f, "compiled_program"),
        }
    }
}

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub output: String,
    pub route: Route,
}

/// Result of a successful syntax check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Compiles with no variables declared.
    Valid,
    /// Compiles once the representative variables are declared.
    ValidWithDeclarations,
}

impl CheckOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CheckOutcome::Valid => "OK",
            CheckOutcome::ValidWithDeclarations => "OK (with variable declarations)",
        }
    }

    pub fn with_declarations(&self) -> bool {
        matches!(self, CheckOutcome::ValidWithDeclarations)
    }
}

/// The program cache and the document cache, created and replaced together.
pub struct CacheContext {
    programs: CostCache<Arc<CompiledProgram>>,
    documents: CostCache<Arc<ParsedEnvironment>>,
}

impl CacheContext {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            programs: CostCache::new("program", config.program_cache()),
            documents: CostCache::new("json", config.json_cache()),
        }
    }

    pub fn programs(&self) -> &CostCache<Arc<CompiledProgram>> {
        &self.programs
    }

    pub fn documents(&self) -> &CostCache<Arc<ParsedEnvironment>> {
        &self.documents
    }

    /// Snapshot of both caches.
    pub fn report(&self) -> CacheReport {
        CacheReport::new(self.programs.metrics(), self.documents.metrics())
    }

    /// Empties both caches and zeroes their counters.
    pub fn clear(&self) {
        self.programs.clear();
        self.documents.clear();
    }

    fn environment(&self, raw: &str) -> CelResult<Arc<ParsedEnvironment>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "{}" {
            return Ok(Arc::new(ParsedEnvironment::empty()));
        }

        if let Some(environment) = self.documents.get(raw) {
            tracing::debug!(bytes = raw.len(), "JSON cache hit");
            return Ok(environment);
        }

        let environment = Arc::new(ParsedEnvironment::parse(raw)?);
        let admitted = self
            .documents
            .set(raw, Arc::clone(&environment), environment.cost());
        tracing::debug!(bytes = raw.len(), admitted, "JSON cache miss");
        Ok(environment)
    }

    fn program<F>(&self, key: &StructuralKey, compile: F) -> CelResult<(Arc<CompiledProgram>, Route)>
    where
        F: FnOnce() -> CelResult<CompiledProgram>,
    {
        let digest = key.digest();
        if let Some(program) = self.programs.get(&digest) {
            tracing::debug!(key = %digest, "Program cache hit");
            return Ok((program, Route::CachedProgram));
        }

        let program = Arc::new(compile()?);
        let admitted = self
            .programs
            .set(digest.clone(), Arc::clone(&program), program.cost());
        tracing::debug!(key = %digest, admitted, "Program compiled");
        Ok((program, Route::CompiledProgram))
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("programs", &self.programs)
            .field("documents", &self.documents)
            .finish()
    }
}

/// Evaluates expressions through the two caches.
///
/// Shared between threads as `Arc<Evaluator>`.
#[derive(Debug)]
pub struct Evaluator {
    caches: RwLock<Arc<CacheContext>>,
    cache_config: RwLock<CacheConfig>,
    fast_path: bool,
}

impl Evaluator {
    pub fn new(config: &Config) -> Self {
        Self {
            caches: RwLock::new(Arc::new(CacheContext::new(&config.cache))),
            cache_config: RwLock::new(config.cache.clone()),
            fast_path: config.engine.fast_path,
        }
    }

    /// Current cache context. Callers keep it for the whole request.
    pub fn caches(&self) -> Arc<CacheContext> {
        Arc::clone(&self.caches.read())
    }

    pub fn fast_path_enabled(&self) -> bool {
        self.fast_path
    }

    /// Replaces both caches with empty ones of the given budgets.
    pub fn reconfigure(&self, program_cache_mb: u64, json_cache_mb: u64) -> CelResult<()> {
        let mut cache_config = self.cache_config.write();
        let next = CacheConfig {
            program_cache_mb,
            json_cache_mb,
            ..cache_config.clone()
        };
        next.validate()?;

        *self.caches.write() = Arc::new(CacheContext::new(&next));
        *cache_config = next;

        tracing::info!(program_cache_mb, json_cache_mb, "Caches reinitialized");
        Ok(())
    }

    /// Evaluates an expression against a JSON object.
    pub fn eval_json(&self, expression: &str, json: &str) -> CelResult<Evaluation> {
        let caches = self.caches();
        let environment = caches.environment(json)?;

        if self.fast_path {
            if let Some(output) = fast_path::resolve(expression, &environment) {
                tracing::debug!(expression, "Resolved by fast path");
                return Ok(Evaluation {
                    output,
                    route: Route::FastPath,
                });
            }
        }

        let key = StructuralKey::derive(expression, &environment);
        let (program, route) = caches.program(&key, || {
            CompilationContext::build(&environment)?.compile(expression)
        })?;

        let value = program.execute(&environment)?;
        Ok(Evaluation {
            output: render(&value),
            route,
        })
    }

    /// Evaluates an expression with an opaque string bound to `data`.
    pub fn eval(&self, expression: &str, payload: &str) -> CelResult<Evaluation> {
        let caches = self.caches();
        let key = StructuralKey::opaque(expression);
        let (program, route) =
            caches.program(&key, || CompilationContext::opaque().compile(expression))?;

        let value = program.execute(&ParsedEnvironment::payload(payload))?;
        Ok(Evaluation {
            output: render(&value),
            route,
        })
    }

    /// Checks that an expression compiles, first with no variables and then
    /// against the representative document.
    pub fn check(&self, expression: &str) -> CelResult<CheckOutcome> {
        let first = match CompilationContext::base().compile(expression) {
            Ok(_) => return Ok(CheckOutcome::Valid),
            Err(e) => e,
        };

        let context = match CompilationContext::build(&ParsedEnvironment::representative()) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(error = %e, "Representative environment unavailable");
                return Err(first);
            }
        };

        context
            .compile(expression)
            .map(|_| CheckOutcome::ValidWithDeclarations)
    }

    pub fn stats(&self) -> CacheReport {
        self.caches().report()
    }

    pub fn clear(&self) {
        self.caches().clear();
        tracing::info!("Caches cleared");
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> Evaluator {
        let mut config = Config::default();
        config.cache.program_counters = 4096;
        config.cache.json_counters = 4096;
        Evaluator::new(&config)
    }

    #[test]
    fn test_constant_expression_is_cached() {
        let evaluator = evaluator();
        let first = evaluator.eval_json("1 + 1", "{}").unwrap();
        assert_eq!(first.output, "2");
        assert_eq!(first.route, Route::CompiledProgram);

        let second = evaluator.eval_json("1 + 1", "{}").unwrap();
        assert_eq!(second.route, Route::CachedProgram);
        assert_eq!(evaluator.stats().program.hits, 1);
    }

    #[test]
    fn test_fast_path_route() {
        let evaluator = evaluator();
        let result = evaluator
            .eval_json("user.name", r#"{"user": {"name": "Jane"}}"#)
            .unwrap();
        assert_eq!(result.output, "Jane");
        assert_eq!(result.route, Route::FastPath);
        assert_eq!(evaluator.stats().program.entries, 0);
    }

    #[test]
    fn test_fast_path_disabled_matches() {
        let mut config = Config::default();
        config.cache.program_counters = 4096;
        config.cache.json_counters = 4096;
        config.engine.fast_path = false;
        let evaluator = Evaluator::new(&config);

        let result = evaluator
            .eval_json("user.name", r#"{"user": {"name": "Jane"}}"#)
            .unwrap();
        assert_eq!(result.output, "Jane");
        assert_eq!(result.route, Route::CompiledProgram);
    }

    #[test]
    fn test_expression_cannot_reuse_shaped_program() {
        let evaluator = evaluator();
        evaluator.eval_json("1 + 1", r#"{"a": "s"}"#).unwrap();

        let err = evaluator
            .eval_json("5#1 + 1|\"a\":string", "{}")
            .unwrap_err();
        assert_eq!(err.kind(), "compile");
        assert_eq!(evaluator.stats().program.hits, 0);
    }

    #[test]
    fn test_json_error_not_cached() {
        let evaluator = evaluator();
        let err = evaluator.eval_json("x", "{oops").unwrap_err();
        assert_eq!(err.kind(), "json_parse");
        assert_eq!(evaluator.stats().json.entries, 0);
    }

    #[test]
    fn test_compile_error_not_cached() {
        let evaluator = evaluator();
        assert!(evaluator.eval_json("1 +", "{}").is_err());
        assert_eq!(evaluator.stats().program.entries, 0);
    }

    #[test]
    fn test_opaque_payload() {
        let evaluator = evaluator();
        let result = evaluator.eval("len(data) > 3", "hello").unwrap();
        assert_eq!(result.output, "true");

        let result = evaluator.eval("data", "").unwrap();
        assert_eq!(result.output, "");
    }

    #[test]
    fn test_check_outcomes() {
        let evaluator = evaluator();
        assert_eq!(evaluator.check("1 + 1").unwrap(), CheckOutcome::Valid);
        assert_eq!(
            evaluator.check("age > 18.0").unwrap(),
            CheckOutcome::ValidWithDeclarations
        );
        assert_eq!(evaluator.check("unknown_var > 1").unwrap_err().kind(), "compile");
        assert_eq!(evaluator.check("1 +").unwrap_err().kind(), "compile");
    }

    #[test]
    fn test_reconfigure_replaces_caches() {
        let evaluator = evaluator();
        evaluator.eval_json("1 + 1", "{}").unwrap();
        let before = evaluator.caches();

        evaluator.reconfigure(16, 8).unwrap();

        let after = evaluator.caches();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.programs().max_cost(), 16 * 1024 * 1024);
        assert_eq!(after.documents().max_cost(), 8 * 1024 * 1024);
        assert_eq!(evaluator.stats().program.entries, 0);
        assert!(evaluator.reconfigure(0, 8).is_err());
    }

    #[test]
    fn test_evaluator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();
    }
}
