//! rankgrid.toml configuration parser.
//!
//! Every field is optional; the accessors fall back to the defaults used
//! by the `rankgrid` binary. Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 60;
pub const DEFAULT_MPI_LAUNCHER: &str = "mpiexec";
pub const DEFAULT_RANKS_FLAG: &str = "-n";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub scheduler: Option<SchedulerConfig>,
    pub launcher: Option<LauncherConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Size of the rank pool.
    pub ranks: Option<u32>,
    /// Idle sleep between loop iterations that made no progress.
    pub poll_interval_ms: Option<u64>,
    /// Interval of the "still waiting" notice while idle.
    pub heartbeat_secs: Option<u64>,
    /// Consecutive launch failures tolerated for one command (0 = unbounded).
    pub max_launch_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Wrapper program for mpi commands.
    pub mpi_launcher: Option<String>,
    /// Flag passing the rank count to the wrapper.
    pub ranks_flag: Option<String>,
    /// "process" or "sentinel".
    pub completion: Option<String>,
    /// Directory watched for completion files in sentinel mode.
    pub sentinel_dir: Option<PathBuf>,
    /// Capture each command's stdout/stderr under `<output>/logs`.
    pub capture_logs: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub svg: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub persist_completions: Option<bool>,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn ranks(&self) -> Option<u32> {
        self.scheduler.as_ref().and_then(|s| s.ranks)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.scheduler
                .as_ref()
                .and_then(|s| s.poll_interval_ms)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        )
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(
            self.scheduler
                .as_ref()
                .and_then(|s| s.heartbeat_secs)
                .unwrap_or(DEFAULT_HEARTBEAT_SECS),
        )
    }

    /// `None` means launch failures are retried forever.
    pub fn max_launch_attempts(&self) -> Option<u32> {
        self.scheduler
            .as_ref()
            .and_then(|s| s.max_launch_attempts)
            .filter(|&n| n > 0)
    }

    pub fn mpi_launcher(&self) -> &str {
        self.launcher
            .as_ref()
            .and_then(|l| l.mpi_launcher.as_deref())
            .unwrap_or(DEFAULT_MPI_LAUNCHER)
    }

    pub fn ranks_flag(&self) -> &str {
        self.launcher
            .as_ref()
            .and_then(|l| l.ranks_flag.as_deref())
            .unwrap_or(DEFAULT_RANKS_FLAG)
    }

    pub fn completion(&self) -> &str {
        self.launcher
            .as_ref()
            .and_then(|l| l.completion.as_deref())
            .unwrap_or("process")
    }

    pub fn capture_logs(&self) -> bool {
        self.launcher
            .as_ref()
            .and_then(|l| l.capture_logs)
            .unwrap_or(true)
    }

    /// Sentinel directory, defaulting to `<output_dir>/done`.
    pub fn sentinel_dir(&self, output_dir: &Path) -> PathBuf {
        self.launcher
            .as_ref()
            .and_then(|l| l.sentinel_dir.clone())
            .unwrap_or_else(|| output_dir.join("done"))
    }

    /// Checkpoint database, defaulting to `<output_dir>/checkpoint.redb`.
    pub fn checkpoint_path(&self, output_dir: &Path) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.checkpoint.clone())
            .unwrap_or_else(|| output_dir.join("checkpoint.redb"))
    }

    /// SVG timeline, defaulting to `<output_dir>/statistics.svg`.
    pub fn svg_path(&self, output_dir: &Path) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.svg.clone())
            .unwrap_or_else(|| output_dir.join("statistics.svg"))
    }

    pub fn summary_json_path(&self) -> Option<&Path> {
        self.output.as_ref().and_then(|o| o.summary_json.as_deref())
    }

    pub fn persist_completions(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|o| o.persist_completions)
            .unwrap_or(true)
    }
}
