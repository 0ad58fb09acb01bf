pub mod check;
pub mod run;
pub mod status;

use std::path::Path;

use rank_core::RunConfig;

/// Load the run configuration, or defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_file(path),
        None => Ok(RunConfig::default()),
    }
}
