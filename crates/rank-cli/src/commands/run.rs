use std::path::PathBuf;

use anyhow::{Context, bail};
use rank_core::{CommandCatalog, RunConfig};
use rank_runtime::{
    CompletionMode, ProcessConfig, ProcessExecutor, SentinelWatcher, SpawnedRanksAllocator,
};
use rankgrid_metrics::RunStatistics;
use rankgrid_scheduler::{CommandsRunner, RunReport, RunnerOptions};
use rankgrid_state::CheckpointStore;
use tracing::{info, warn};

use super::load_config;

pub struct RunArgs {
    pub commands: PathBuf,
    pub output_dir: PathBuf,
    pub ranks: Option<u32>,
    pub config: Option<PathBuf>,
    pub svg: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
    pub completion: Option<String>,
    pub launcher: Option<String>,
    pub no_checkpoint: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let ranks = args
        .ranks
        .or(config.ranks())
        .context("pool size not set: pass --ranks or set [scheduler].ranks")?;
    if ranks == 0 {
        bail!("the rank pool must hold at least one rank");
    }

    let catalog = CommandCatalog::from_file(&args.commands)?;
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("cannot create output directory {}", args.output_dir.display())
    })?;
    info!(
        commands = catalog.len(),
        ranks,
        output = %args.output_dir.display(),
        "loaded commands"
    );

    let executor = build_executor(&args, &config)?;
    let checkpoint = if args.no_checkpoint {
        None
    } else {
        Some(CheckpointStore::open(&config.checkpoint_path(&args.output_dir))?)
    };

    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(ranks, executor),
        checkpoint,
        RunnerOptions::from_config(&config),
    )?;
    let report = runner.run().await?;

    report_statistics(&args, &config, &report, runner.historic())
}

fn build_executor(args: &RunArgs, config: &RunConfig) -> anyhow::Result<ProcessExecutor> {
    let completion = match args.completion.as_deref().unwrap_or(config.completion()) {
        "process" => CompletionMode::ProcessExit,
        "sentinel" => {
            let dir = config.sentinel_dir(&args.output_dir);
            let watcher = SentinelWatcher::create(dir.clone()).with_context(|| {
                format!("cannot create sentinel directory {}", dir.display())
            })?;
            CompletionMode::Sentinel(watcher)
        }
        other => bail!("unknown completion mode '{other}' (expected process or sentinel)"),
    };

    let process = ProcessConfig {
        mpi_launcher: args
            .launcher
            .clone()
            .unwrap_or_else(|| config.mpi_launcher().to_string()),
        ranks_flag: config.ranks_flag().to_string(),
        log_dir: config
            .capture_logs()
            .then(|| args.output_dir.join("logs")),
    };
    Ok(ProcessExecutor::new(process, completion))
}

fn report_statistics(
    args: &RunArgs,
    config: &RunConfig,
    report: &RunReport,
    historic: &[rank_runtime::Instance],
) -> anyhow::Result<()> {
    let stats = RunStatistics::new(historic, report.begin, report.end, report.total_ranks);

    println!("{}", stats.summary());
    if report.skipped > 0 {
        println!("Skipped {} commands completed by a previous run", report.skipped);
    }
    if report.launch_failures > 0 {
        println!("Retried {} failed launches", report.launch_failures);
    }

    let svg = args
        .svg
        .clone()
        .unwrap_or_else(|| config.svg_path(&args.output_dir));
    if let Err(e) = stats.export_svg(&svg) {
        warn!(error = %e, "skipping svg export");
    }

    if let Some(path) = args.summary_json.as_deref().or(config.summary_json_path()) {
        stats.export_summary_json(path)?;
    }
    Ok(())
}
