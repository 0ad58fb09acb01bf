//! Run statistics: load balance and timing over the run history.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use rank_runtime::Instance;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::svg::render_svg;

/// Timing of one finished command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTiming {
    pub id: String,
    pub ranks: u32,
    pub elapsed_ms: u64,
}

/// Serializable digest of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_ranks: u32,
    /// Finished commands in the history.
    pub commands: usize,
    pub total_elapsed_ms: u64,
    pub load_balance_ratio: f64,
    pub longest: Option<CommandTiming>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Finished running {} commands on {} ranks. Total elapsed time: {}ms",
            self.commands, self.total_ranks, self.total_elapsed_ms
        )?;
        if let Some(longest) = &self.longest {
            writeln!(
                f,
                "Longest command: {} ({}ms on {} ranks)",
                longest.id, longest.elapsed_ms, longest.ranks
            )?;
        }
        write!(f, "Load balance ratio: {:.4}", self.load_balance_ratio)
    }
}

/// Aggregates over the history of one run.
///
/// Only finished instances count; an instance still running when the
/// statistics are taken contributes nothing.
pub struct RunStatistics<'a> {
    historic: &'a [Instance],
    begin: Instant,
    end: Instant,
    total_ranks: u32,
}

impl<'a> RunStatistics<'a> {
    pub fn new(historic: &'a [Instance], begin: Instant, end: Instant, total_ranks: u32) -> Self {
        Self {
            historic,
            begin,
            end,
            total_ranks,
        }
    }

    pub fn historic(&self) -> &'a [Instance] {
        self.historic
    }

    pub fn begin(&self) -> Instant {
        self.begin
    }

    pub fn total_ranks(&self) -> u32 {
        self.total_ranks
    }

    /// Length of the run window.
    pub fn total_elapsed_ms(&self) -> u64 {
        self.end.saturating_duration_since(self.begin).as_millis() as u64
    }

    fn finished(&self) -> impl Iterator<Item = &'a Instance> {
        self.historic.iter().filter(|i| i.is_finished())
    }

    /// Rank-milliseconds consumed by finished commands.
    pub fn consumed_rank_ms(&self) -> u64 {
        self.finished()
            .map(|i| i.elapsed_ms() * u64::from(i.ranks()))
            .sum()
    }

    /// Fraction of the available rank-time spent running commands.
    ///
    /// 1.0 means every rank was busy for the whole window. An empty pool
    /// or an empty window yields 0.0.
    pub fn load_balance_ratio(&self) -> f64 {
        let window = self.total_elapsed_ms();
        if window == 0 || self.total_ranks == 0 {
            return 0.0;
        }
        self.consumed_rank_ms() as f64 / (f64::from(self.total_ranks) * window as f64)
    }

    /// The finished command with the longest wall-clock time.
    pub fn longest(&self) -> Option<CommandTiming> {
        self.finished()
            .max_by_key(|i| i.elapsed_ms())
            .map(|i| CommandTiming {
                id: i.id().to_string(),
                ranks: i.ranks(),
                elapsed_ms: i.elapsed_ms(),
            })
    }

    pub fn longest_ms(&self) -> u64 {
        self.longest().map(|t| t.elapsed_ms).unwrap_or(0)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_ranks: self.total_ranks,
            commands: self.finished().count(),
            total_elapsed_ms: self.total_elapsed_ms(),
            load_balance_ratio: self.load_balance_ratio(),
            longest: self.longest(),
        }
    }

    /// Write the summary as pretty JSON.
    pub fn export_summary_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "run summary saved");
        Ok(())
    }

    pub fn render_svg(&self) -> String {
        render_svg(self)
    }

    /// Write the utilization timeline to `path`.
    pub fn export_svg(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.render_svg())
            .with_context(|| format!("failed to write svg to {}", path.display()))?;
        info!(path = %path.display(), "svg timeline saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rank_core::Command;

    use super::*;

    fn finished(id: &str, first: u32, ranks: u32, begin: Instant, from_ms: u64, to_ms: u64) -> Instance {
        let command = Arc::new(Command::new(id, ranks > 1, ranks, 1, vec![]).unwrap());
        let mut instance =
            Instance::with_start(command, first, ranks, begin + Duration::from_millis(from_ms));
        instance.mark_finished_at(begin + Duration::from_millis(to_ms));
        instance
    }

    #[test]
    fn back_to_back_full_pool_is_perfectly_balanced() {
        let begin = Instant::now();
        let historic = vec![
            finished("x", 0, 8, begin, 0, 500),
            finished("y", 0, 4, begin, 500, 1000),
            finished("z", 4, 4, begin, 500, 1000),
        ];
        let stats = RunStatistics::new(&historic, begin, begin + Duration::from_secs(1), 8);
        assert_eq!(stats.load_balance_ratio(), 1.0);
    }

    #[test]
    fn idle_ranks_lower_the_ratio() {
        let begin = Instant::now();
        let historic = vec![finished("a", 0, 2, begin, 0, 1000)];
        let stats = RunStatistics::new(&historic, begin, begin + Duration::from_secs(1), 8);
        assert_eq!(stats.load_balance_ratio(), 0.25);
        assert_eq!(stats.consumed_rank_ms(), 2000);
    }

    #[test]
    fn empty_window_or_pool_yields_zero() {
        let begin = Instant::now();
        let stats = RunStatistics::new(&[], begin, begin, 8);
        assert_eq!(stats.load_balance_ratio(), 0.0);

        let stats = RunStatistics::new(&[], begin, begin + Duration::from_secs(1), 0);
        assert_eq!(stats.load_balance_ratio(), 0.0);
    }

    #[test]
    fn unfinished_instances_do_not_count() {
        let begin = Instant::now();
        let command = Arc::new(Command::new("late", false, 1, 1, vec![]).unwrap());
        let historic = vec![
            finished("done", 0, 1, begin, 0, 100),
            Instance::with_start(command, 1, 1, begin),
        ];
        let stats = RunStatistics::new(&historic, begin, begin + Duration::from_millis(100), 2);
        assert_eq!(stats.summary().commands, 1);
        assert_eq!(stats.load_balance_ratio(), 0.5);
    }

    #[test]
    fn summary_reports_longest_command() {
        let begin = Instant::now();
        let historic = vec![
            finished("short", 0, 4, begin, 0, 200),
            finished("long", 4, 2, begin, 0, 900),
            finished("mid", 0, 4, begin, 200, 600),
        ];
        let stats = RunStatistics::new(&historic, begin, begin + Duration::from_millis(1000), 6);

        let summary = stats.summary();
        assert_eq!(summary.commands, 3);
        assert_eq!(summary.total_elapsed_ms, 1000);
        assert_eq!(
            summary.longest,
            Some(CommandTiming {
                id: "long".to_string(),
                ranks: 2,
                elapsed_ms: 900
            })
        );
        assert_eq!(stats.longest_ms(), 900);

        let text = summary.to_string();
        assert!(text.contains("Total elapsed time: 1000ms"));
        assert!(text.contains("Longest command: long (900ms on 2 ranks)"));
        assert!(text.contains("Load balance ratio: "));
    }

    #[test]
    fn summary_json_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let begin = Instant::now();
        let historic = vec![finished("a", 0, 1, begin, 0, 50)];
        let stats = RunStatistics::new(&historic, begin, begin + Duration::from_millis(100), 1);

        stats.export_summary_json(&path).unwrap();
        let parsed: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, stats.summary());
        assert_eq!(parsed.load_balance_ratio, 0.5);
    }
}
