use celcache::cli::{Cli, Commands};
use celcache::types::config::Config;
use celcache::CelResult;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> CelResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default_config()
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("celcache={}", log_level)
            .parse()
            .unwrap_or_else(|_| "celcache=info".parse().expect("fallback directive is valid")),
    );

    if config.general.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Eval {
            expression,
            payload,
        } => {
            celcache::cli::commands::eval(&expression, &payload, &config)?;
        }
        Commands::EvalJson { expression, json } => {
            celcache::cli::commands::eval_json(&expression, &json, &config)?;
        }
        Commands::Check { expression } => {
            celcache::cli::commands::check(&expression, &config)?;
        }
        Commands::Stats => {
            celcache::cli::commands::stats(&config)?;
        }
        Commands::Bench {
            expression,
            json,
            iterations,
        } => {
            celcache::cli::commands::bench(&expression, &json, iterations, &config)?;
        }
        Commands::Serve => {
            celcache::cli::commands::serve(&config).await?;
        }
        Commands::Init { path } => {
            celcache::cli::commands::init(path)?;
        }
        Commands::Version => {
            celcache::cli::commands::version();
        }
    }

    Ok(())
}
