//! Process executor: runs each command as a child process.
//!
//! MPI commands are wrapped in a launcher (`mpiexec -n <ranks> args...`),
//! sequential commands run their arguments directly. Every child gets its
//! rank grant in the environment:
//!
//! - `RANKGRID_COMMAND_ID`
//! - `RANKGRID_FIRST_RANK`
//! - `RANKGRID_RANKS`
//!
//! Completion is either the child's exit or a sentinel file written by the
//! command itself (see [`SentinelWatcher`]).

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::error::LaunchError;
use crate::executor::Executor;
use crate::instance::Instance;
use crate::sentinel::SentinelWatcher;

/// How the executor learns that a command finished.
#[derive(Debug)]
pub enum CompletionMode {
    /// The child process exited.
    ProcessExit,
    /// A file named after the command appeared in the watched directory.
    Sentinel(SentinelWatcher),
}

/// Launch settings for [`ProcessExecutor`].
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Wrapper program for mpi commands.
    pub mpi_launcher: String,
    /// Flag passing the rank count to the wrapper.
    pub ranks_flag: String,
    /// Where `<id>.log` files are written; inherit stdio when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            mpi_launcher: "mpiexec".to_string(),
            ranks_flag: "-n".to_string(),
            log_dir: None,
        }
    }
}

pub struct ProcessExecutor {
    config: ProcessConfig,
    completion: CompletionMode,
    /// Running children by command id.
    children: HashMap<String, Child>,
}

impl ProcessExecutor {
    pub fn new(config: ProcessConfig, completion: CompletionMode) -> Self {
        Self {
            config,
            completion,
            children: HashMap::new(),
        }
    }

    /// Number of children not yet reaped.
    pub fn running_count(&self) -> usize {
        self.children.len()
    }

    /// Program and argument list used to start `instance`.
    pub fn invocation(&self, instance: &Instance) -> Result<(String, Vec<String>), LaunchError> {
        let command = instance.command();
        if command.is_mpi() {
            if command.args().is_empty() {
                return Err(LaunchError::EmptyCommand(command.id().to_string()));
            }
            let mut args = vec![
                self.config.ranks_flag.clone(),
                instance.ranks().to_string(),
            ];
            args.extend(command.args().iter().cloned());
            Ok((self.config.mpi_launcher.clone(), args))
        } else {
            let (program, rest) = command
                .args()
                .split_first()
                .ok_or_else(|| LaunchError::EmptyCommand(command.id().to_string()))?;
            Ok((program.clone(), rest.to_vec()))
        }
    }

    fn stdio(&self, id: &str) -> Result<(Stdio, Stdio), LaunchError> {
        let Some(dir) = &self.config.log_dir else {
            return Ok((Stdio::inherit(), Stdio::inherit()));
        };
        let path = dir.join(format!("{id}.log"));
        let log_err = |source| LaunchError::Log {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(log_err)?;
        let stdout = File::create(&path).map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    /// Reap exited children. Returns the ids of those that exited.
    fn reap(&mut self) -> Vec<String> {
        let mut exited = Vec::new();
        self.children.retain(|id, child| match child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    debug!(command = %id, "process exited");
                } else {
                    warn!(command = %id, %status, "process exited with failure");
                }
                exited.push(id.clone());
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(command = %id, error = %e, "cannot query process status");
                exited.push(id.clone());
                false
            }
        });
        exited
    }
}

impl Executor for ProcessExecutor {
    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError> {
        let (program, args) = self.invocation(instance)?;
        let (stdout, stderr) = self.stdio(instance.id())?;

        let child = Command::new(&program)
            .args(&args)
            .env("RANKGRID_COMMAND_ID", instance.id())
            .env("RANKGRID_FIRST_RANK", instance.starting_rank().to_string())
            .env("RANKGRID_RANKS", instance.ranks().to_string())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                id: instance.id().to_string(),
                program: program.clone(),
                source,
            })?;

        info!(
            command = %instance.id(),
            %program,
            pid = ?child.id(),
            "process started"
        );
        self.children.insert(instance.id().to_string(), child);
        Ok(())
    }

    fn poll_finished(&mut self) -> Vec<String> {
        let exited = self.reap();
        match &mut self.completion {
            CompletionMode::ProcessExit => exited,
            CompletionMode::Sentinel(watcher) => {
                for id in &exited {
                    warn!(
                        command = %id,
                        dir = ?watcher.dir(),
                        "process exited without its sentinel file being seen yet"
                    );
                }
                watcher.poll()
            }
        }
    }
}
