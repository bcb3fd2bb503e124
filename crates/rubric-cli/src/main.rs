mod config;
mod report_cmd;
mod run_cmd;
mod score_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rubric", about = "Batch evaluation harness for LLM coding agents")]
struct Cli {
    /// Config file naming the agent and judge commands
    /// (default: ./rubric.toml, then the XDG config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of cases through the agent
    Run {
        /// Cases file: one JSON case object per line
        cases_file: PathBuf,
        /// Keep only cases whose stack equals this value
        #[arg(long)]
        stack: Option<String>,
        /// Run at most this many matching cases
        #[arg(long)]
        max: Option<usize>,
        /// Wall-clock limit per agent invocation, in seconds
        #[arg(long, default_value_t = 90)]
        timeout: u64,
        /// Results directory to write artifacts into
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Judge every completed run in a results directory
    Score {
        /// Results directory produced by `rubric run`
        results_dir: PathBuf,
        /// Wall-clock limit per judge invocation, in seconds
        #[arg(long, default_value_t = 90)]
        timeout: u64,
    },
    /// Aggregate score records into a markdown report
    Report {
        /// Results directory produced by `rubric score`
        results_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            cases_file,
            stack,
            max,
            timeout,
            out,
        } => {
            run_cmd::run_run(
                cli.config.as_deref(),
                &cases_file,
                stack,
                max,
                timeout,
                &out,
            )
            .await
        }
        Commands::Score {
            results_dir,
            timeout,
        } => score_cmd::run_score(cli.config.as_deref(), &results_dir, timeout).await,
        Commands::Report { results_dir } => report_cmd::run_report(&results_dir),
    };

    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
