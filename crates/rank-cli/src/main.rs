//! rankgrid: run a batch of commands over a fixed pool of ranks.
//!
//! # Usage
//!
//! ```text
//! rankgrid run commands.txt out/ --ranks 64
//! rankgrid check commands.txt --ranks 64
//! rankgrid status commands.txt out/
//! rankgrid reset out/
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Log filter used when `RUST_LOG` is unset. Lists every workspace crate
/// prefix so pool and sentinel events are visible too.
const DEFAULT_LOG_FILTER: &str = "info,rankgrid=debug,rank_runtime=debug,rank_core=debug";

#[derive(Parser)]
#[command(
    name = "rankgrid",
    about = "rankgrid: schedule MPI and sequential commands over a fixed pool of ranks",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every command of a commands file, resuming from the checkpoint.
    ///
    /// Each line of the commands file reads `id mode ranks cost [arg...]`,
    /// where mode is `mpi` or anything else for a sequential command.
    Run {
        /// Commands file.
        commands: PathBuf,
        /// Directory for logs, checkpoint and statistics.
        output_dir: PathBuf,
        /// Size of the rank pool. Overrides [scheduler].ranks.
        #[arg(short, long)]
        ranks: Option<u32>,
        /// Run configuration (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where to write the SVG timeline (default: <output_dir>/statistics.svg).
        #[arg(long)]
        svg: Option<PathBuf>,
        /// Also write the run summary as JSON.
        #[arg(long)]
        summary_json: Option<PathBuf>,
        /// How completion is detected: process or sentinel.
        #[arg(long)]
        completion: Option<String>,
        /// Wrapper program for mpi commands (default: mpiexec).
        #[arg(long)]
        launcher: Option<String>,
        /// Neither read nor write the checkpoint.
        #[arg(long)]
        no_checkpoint: bool,
    },
    /// Validate a commands file and print the admission order.
    Check {
        commands: PathBuf,
        /// Also reject commands wider than this pool.
        #[arg(short, long)]
        ranks: Option<u32>,
    },
    /// List done and pending commands according to the checkpoint.
    Status {
        commands: PathBuf,
        output_dir: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Forget every completed command in the checkpoint.
    Reset {
        output_dir: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            commands,
            output_dir,
            ranks,
            config,
            svg,
            summary_json,
            completion,
            launcher,
            no_checkpoint,
        } => {
            commands::run::run(commands::run::RunArgs {
                commands,
                output_dir,
                ranks,
                config,
                svg,
                summary_json,
                completion,
                launcher,
                no_checkpoint,
            })
            .await
        }
        Commands::Check { commands, ranks } => commands::check::check(&commands, ranks),
        Commands::Status {
            commands,
            output_dir,
            config,
        } => commands::status::status(&commands, &output_dir, config.as_deref()),
        Commands::Reset { output_dir, config } => {
            commands::status::reset(&output_dir, config.as_deref())
        }
    }
}
