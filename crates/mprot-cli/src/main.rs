//! mprot CLI - verify management plans before running them
//!
//! - `analyze`: check a plan (strict or weak validity) or a sequence against
//!   an application snapshot
//! - `inspect`: list the node types and live instances of an application
//! - `config`: show the effective configuration
//!
//! Exit status: 0 when the verdict holds, 1 when it does not, 2 when the
//! inputs cannot be loaded or the plan is misused.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{analyze, inspect};
use config::CliConfig;
use error::CliResult;
use output::OutputFormat;

/// mprot CLI application
#[derive(Parser)]
#[command(name = "mprot")]
#[command(about = "mprot - static verification of management plans", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MPROT_CONFIG", global = true)]
    config: Option<String>,

    /// Output format (table, json); defaults to the configured format
    #[arg(short, long, global = true)]
    output: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Check a plan or sequence against an application
    #[command(alias = "check")]
    Analyze(analyze::AnalyzeArgs),

    /// Show node types and live instances of an application
    Inspect {
        /// Application description (JSON)
        #[arg(long)]
        app: PathBuf,
    },

    /// Show configuration
    Config,
}

fn run(cli: Cli) -> CliResult<bool> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let format = cli.output.or(config.output).unwrap_or_default();

    match cli.command {
        Commands::Analyze(args) => analyze::execute(args, &config, format),
        Commands::Inspect { app } => inspect::execute(&app, format).map(|()| true),
        Commands::Config => {
            match format {
                OutputFormat::Json => output::print_json(&config)?,
                OutputFormat::Table => {
                    println!("Config file: {}", cli.config.as_deref().unwrap_or("(default)"));
                    println!("Default validity: {}", config.default_validity.unwrap_or_default());
                    println!("Output: {:?}", format);
                    match config.max_orderings {
                        Some(max) => println!("Max orderings: {}", max),
                        None => println!("Max orderings: unbounded"),
                    }
                }
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}
