//! Command line interface for celcache.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// celcache - cached CEL expression evaluation.
#[derive(Parser, Debug)]
#[command(name = "celcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "celcache.toml")]
    pub config: PathBuf,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluates an expression with an opaque payload bound to `data`.
    Eval {
        expression: String,

        #[arg(default_value = "")]
        payload: String,
    },

    /// Evaluates an expression against a JSON object.
    #[command(name = "eval-json")]
    EvalJson {
        expression: String,

        #[arg(default_value = "{}")]
        json: String,
    },

    /// Checks that an expression compiles.
    Check { expression: String },

    /// Prints cache statistics.
    Stats,

    /// Evaluates an expression repeatedly and reports cache behaviour.
    Bench {
        expression: String,

        #[arg(default_value = "{}")]
        json: String,

        /// Number of evaluations.
        #[arg(short = 'n', long, default_value_t = 1000)]
        iterations: u64,
    },

    /// Starts the JSON-RPC server on stdio.
    Serve,

    /// Writes a default configuration file.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Shows version.
    Version,
}
