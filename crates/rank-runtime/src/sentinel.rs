//! Sentinel watcher: completion signalled by files dropped in a directory.
//!
//! A finished command writes a file named after its id into the watched
//! directory. The watcher removes every file it sees and reports its name.
//! Files may show up late or several times; callers must tolerate
//! duplicate ids.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SentinelWatcher {
    dir: PathBuf,
}

impl SentinelWatcher {
    /// Watch `dir`, creating it if needed.
    ///
    /// Files left over from an earlier run are removed: they belong to
    /// processes that are gone, and a command admitted again must not be
    /// reported finished before it writes its own sentinel.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut stale = 0;
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
                stale += 1;
            }
        }
        if stale > 0 {
            warn!(dir = ?dir, removed = stale, "removed stale sentinel files");
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Collect and remove the sentinel files currently present.
    pub fn poll(&mut self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "cannot scan sentinel directory");
                return Vec::new();
            }
        };

        let mut finished = Vec::new();
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    // Still report it; a later poll will see the file again.
                    warn!(file = %name, error = %e, "cannot remove sentinel file");
                }
            }
            debug!(command = %name, "sentinel file seen");
            finished.push(name);
        }
        finished
    }
}
