//! Reddit Analyzer - structured-output agents from the terminal

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{calc_command, init_command, status_command};

/// Reddit Analyzer - run tool-calling agents that answer in JSON
#[derive(Parser)]
#[command(name = "analyzer")]
#[command(about = "Run tool-calling LLM agents with schema-validated output")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the config file
    Init,
    /// Show configuration status
    Status,
    /// Add two numbers with the calculator agent
    Calc {
        #[arg(long, allow_negative_numbers = true)]
        num1: i64,
        #[arg(long, allow_negative_numbers = true)]
        num2: i64,
        /// Maximum calls of the add tool
        #[arg(short, long)]
        limit: Option<u32>,
        /// Give up after this many seconds
        #[arg(short, long, default_value_t = 60)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Status => status_command().await,
        Commands::Calc {
            num1,
            num2,
            limit,
            timeout,
        } => calc_command(num1, num2, limit, timeout).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
