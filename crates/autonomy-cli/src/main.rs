mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    bench::BenchSubcommand, confidence::ConfidenceSubcommand, config::ConfigSubcommand,
    learn::LearnSubcommand, signals::SignalsSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autonomy",
    about = "Confidence scoring, signal processing, benchmarking, and learning for autonomous agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .autonomy/ or .git/)
    #[arg(long, global = true, env = "AUTONOMY_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the .autonomy/ directory tree and default config
    Init,

    /// Show or validate the engine configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Score candidate tasks and map scores to decisions
    Confidence {
        #[command(subcommand)]
        subcommand: ConfidenceSubcommand,
    },

    /// Replay, inspect, and watch signals
    Signals {
        #[command(subcommand)]
        subcommand: SignalsSubcommand,
    },

    /// Run benchmark suites
    Bench {
        #[command(subcommand)]
        subcommand: BenchSubcommand,
    },

    /// Mine the execution log for learnings and proposals
    Learn {
        #[command(subcommand)]
        subcommand: LearnSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Signals {
            subcommand: SignalsSubcommand::Watch { .. },
        } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Confidence { subcommand } => cmd::confidence::run(&root, subcommand, cli.json),
        Commands::Signals { subcommand } => cmd::signals::run(&root, subcommand, cli.json),
        Commands::Bench { subcommand } => cmd::bench::run(&root, subcommand, cli.json),
        Commands::Learn { subcommand } => cmd::learn::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
