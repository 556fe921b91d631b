use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use fatpitch::cli::scan::ScanOptions;
use fatpitch::core::config::ScanDepth;
use fatpitch::core::log::init_logging;
use fatpitch::core::screen::Predicate;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Scan the universe and display the shortlist
    Scan(ScanArgs),
    /// List the symbols a full scan would cover
    Universe,
}

#[derive(Args)]
struct ScanArgs {
    /// Minimum dividend yield in percent
    #[arg(long)]
    min_yield: Option<f64>,

    /// Minimum ROIC proxy in percent
    #[arg(long)]
    min_roic: Option<f64>,

    /// Minimum operating margin in percent
    #[arg(long)]
    min_margin: Option<f64>,

    /// Maximum debt to EBITDA ratio
    #[arg(long = "max-debt")]
    max_debt_ebitda: Option<f64>,

    /// Minimum insider ownership in percent
    #[arg(long)]
    min_insider: Option<f64>,

    /// Maximum forward P/E
    #[arg(long)]
    max_pe: Option<f64>,

    /// Minimum quality score (0-100)
    #[arg(long)]
    min_score: Option<f64>,

    /// Number of instruments to scan, or "all"
    #[arg(short, long)]
    depth: Option<ScanDepth>,

    /// Sort keys, e.g. "score,yield" or "pe:asc"
    #[arg(short, long, value_delimiter = ',')]
    sort: Option<Vec<String>>,

    /// Extra filter such as "fcf_yield>=5" (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<Predicate>,

    /// Write the shortlist to a CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ignore cached market data
    #[arg(long)]
    refresh: bool,
}

impl From<ScanArgs> for ScanOptions {
    fn from(args: ScanArgs) -> Self {
        ScanOptions {
            min_yield: args.min_yield,
            min_roic: args.min_roic,
            min_margin: args.min_margin,
            max_debt_ebitda: args.max_debt_ebitda,
            min_insider: args.min_insider,
            max_pe: args.max_pe,
            min_score: args.min_score,
            depth: args.depth,
            sort: args.sort,
            filters: args.filters,
            output: args.output,
            refresh: args.refresh,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => match config_path {
            Some(path) => fatpitch::cli::setup::setup_at_path(path),
            None => fatpitch::cli::setup::setup(),
        },
        Some(Commands::Scan(args)) => {
            fatpitch::run_command(fatpitch::AppCommand::Scan(args.into()), config_path).await
        }
        Some(Commands::Universe) => {
            fatpitch::run_command(fatpitch::AppCommand::Universe, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
