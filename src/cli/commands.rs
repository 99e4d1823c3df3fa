//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{Evaluator, Route};
use crate::host::{is_error, Boundary, HostServer};
use crate::types::config::Config;
use crate::types::errors::CelError;
use crate::CelResult;

fn boundary(config: &Config) -> Boundary {
    Boundary::new(Arc::new(Evaluator::new(config)))
}

/// Prints boundary output; failures go to stderr and fail the command.
fn emit(output: String) -> CelResult<()> {
    if is_error(&output) {
        eprintln!("{}", output);
        return Err(CelError::other("evaluation failed"));
    }
    println!("{}", output);
    Ok(())
}

/// Evaluates an expression against an opaque payload.
pub fn eval(expression: &str, payload: &str, config: &Config) -> CelResult<()> {
    emit(boundary(config).eval(expression, payload))
}

/// Evaluates an expression against a JSON document.
pub fn eval_json(expression: &str, json: &str, config: &Config) -> CelResult<()> {
    emit(boundary(config).eval_json(expression, json))
}

/// Checks an expression.
pub fn check(expression: &str, config: &Config) -> CelResult<()> {
    emit(boundary(config).check(expression))
}

/// Prints the statistics of a fresh evaluator, mostly useful to inspect the
/// configured budgets.
pub fn stats(config: &Config) -> CelResult<()> {
    let stats: serde_json::Value = serde_json::from_str(&boundary(config).cache_stats())?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Runs the same evaluation `iterations` times and prints timing and cache
/// statistics.
pub fn bench(expression: &str, json: &str, iterations: u64, config: &Config) -> CelResult<()> {
    let evaluator = Evaluator::new(config);
    let iterations = iterations.max(1);

    let mut routes = [0u64; 3];
    let started = Instant::now();
    for _ in 0..iterations {
        let evaluation = evaluator.eval_json(expression, json)?;
        let slot = match evaluation.route {
            Route::FastPath => 0,
            Route::CachedProgram => 1,
            Route::CompiledProgram => 2,
        };
        routes[slot] += 1;
    }
    let elapsed = started.elapsed();

    let report = evaluator.stats();
    let per_call = elapsed.as_nanos() / u128::from(iterations);

    println!("Iterations:        {}", iterations);
    println!("Total:             {:.3?}", elapsed);
    println!("Per evaluation:    {} ns", per_call);
    println!();
    println!("Fast path:         {}", routes[0]);
    println!("Cached program:    {}", routes[1]);
    println!("Compiled program:  {}", routes[2]);
    println!();
    println!(
        "Program cache:     {} hits / {} misses ({:.1}%)",
        report.program.hits,
        report.program.misses,
        report.program.hit_ratio() * 100.0
    );
    println!(
        "JSON cache:        {} hits / {} misses ({:.1}%)",
        report.json.hits,
        report.json.misses,
        report.json.hit_ratio() * 100.0
    );
    println!("Memory usage:      {} bytes", report.memory_usage());

    Ok(())
}

/// Starts the JSON-RPC server on stdio.
pub async fn serve(config: &Config) -> CelResult<()> {
    tracing::debug!(
        program_cache_mb = config.cache.program_cache_mb,
        json_cache_mb = config.cache.json_cache_mb,
        fast_path = config.engine.fast_path,
        "Configuration loaded"
    );

    let mut server = HostServer::new(config.clone())?;
    server.run().await
}

/// Writes a default configuration into the target directory.
pub fn init(path: Option<PathBuf>) -> CelResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("celcache.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    Config::default_config().save(&config_path)?;

    println!("celcache initialized successfully!");
    println!("Configuration created at: {}", config_path.display());

    Ok(())
}

/// Shows version.
pub fn version() {
    println!("celcache {}", env!("CARGO_PKG_VERSION"));
    println!("extensions v{}", crate::engine::extensions::EXTENSIONS_VERSION);
}
