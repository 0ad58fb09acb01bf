//! Run loop tests.
//!
//! Drives `CommandsRunner` over a `SpawnedRanksAllocator` whose executor
//! is scripted by the test: launches can be made to fail and completion
//! signals are delivered by hand or automatically.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use rank_core::{Command, CommandCatalog};
use rank_runtime::{Executor, Instance, LaunchError, RankAllocator, SpawnedRanksAllocator};
use rankgrid_scheduler::{CommandsRunner, RunnerOptions, SchedulerError};
use rankgrid_state::CheckpointStore;

#[derive(Default)]
struct FakeState {
    launched: Vec<String>,
    signals: VecDeque<String>,
    /// Remaining forced launch failures per command id.
    failures: HashMap<String, u32>,
    /// Queue a completion for every launch, delivered one per poll.
    auto_complete: bool,
}

#[derive(Clone, Default)]
struct FakeExecutor {
    state: Rc<RefCell<FakeState>>,
}

impl FakeExecutor {
    fn auto() -> Self {
        let executor = Self::default();
        executor.state.borrow_mut().auto_complete = true;
        executor
    }

    fn fail(&self, id: &str, times: u32) {
        self.state
            .borrow_mut()
            .failures
            .insert(id.to_string(), times);
    }

    fn signal(&self, id: &str) {
        self.state.borrow_mut().signals.push_back(id.to_string());
    }

    fn launched(&self) -> Vec<String> {
        self.state.borrow().launched.clone()
    }
}

impl Executor for FakeExecutor {
    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError> {
        let mut state = self.state.borrow_mut();
        if let Some(left) = state.failures.get_mut(instance.id()) {
            if *left > 0 {
                *left -= 1;
                return Err(LaunchError::Rejected {
                    id: instance.id().to_string(),
                    reason: "node busy".to_string(),
                });
            }
        }
        state.launched.push(instance.id().to_string());
        if state.auto_complete {
            state.signals.push_back(instance.id().to_string());
        }
        Ok(())
    }

    fn poll_finished(&mut self) -> Vec<String> {
        let mut state = self.state.borrow_mut();
        if state.auto_complete {
            state.signals.pop_front().into_iter().collect()
        } else {
            state.signals.drain(..).collect()
        }
    }
}

fn catalog(entries: &[(&str, u32, u64)]) -> CommandCatalog {
    let mut catalog = CommandCatalog::new();
    for &(id, ranks, cost) in entries {
        let command = Command::new(id, ranks > 1, ranks, cost, vec!["true".to_string()]).unwrap();
        catalog.add(command).unwrap();
    }
    catalog
}

fn runner(
    catalog: &CommandCatalog,
    ranks: u32,
    executor: FakeExecutor,
) -> CommandsRunner<SpawnedRanksAllocator<FakeExecutor>> {
    CommandsRunner::new(
        catalog,
        SpawnedRanksAllocator::new(ranks, executor),
        None,
        RunnerOptions::default(),
    )
    .unwrap()
}

fn fast_options() -> RunnerOptions {
    RunnerOptions {
        poll_interval: Duration::from_millis(1),
        ..RunnerOptions::default()
    }
}

/// Step until the runner has nothing left, checking the rank accounting
/// after every iteration.
fn drain(runner: &mut CommandsRunner<SpawnedRanksAllocator<FakeExecutor>>) {
    for _ in 0..1000 {
        if runner.is_done() {
            return;
        }
        runner.step().unwrap();

        let held: u32 = runner
            .historic()
            .iter()
            .filter(|i| !i.is_finished())
            .map(|i| i.ranks())
            .sum();
        let alloc = runner.allocator();
        assert!(held <= alloc.total_ranks());
        assert_eq!(held, alloc.total_ranks() - alloc.free_ranks());
    }
    panic!("runner did not finish");
}

#[test]
fn widest_and_costliest_commands_go_first() {
    let executor = FakeExecutor::default();
    let catalog = catalog(&[("a", 4, 10), ("b", 4, 20), ("c", 2, 5)]);
    let mut runner = runner(&catalog, 4, executor.clone());
    assert_eq!(runner.pending_ids(), ["b", "a", "c"]);

    assert!(runner.step().unwrap());
    assert_eq!(executor.launched(), ["b"]);
    // Pool is full: nothing moves until b finishes.
    assert!(!runner.step().unwrap());

    executor.signal("b");
    assert!(runner.step().unwrap());
    assert!(runner.step().unwrap());
    assert_eq!(executor.launched(), ["b", "a"]);

    executor.signal("a");
    drain_with_signals(&mut runner, &executor);
    assert_eq!(executor.launched(), ["b", "a", "c"]);
}

/// Like `drain`, but answers every launch with a completion signal.
fn drain_with_signals(
    runner: &mut CommandsRunner<SpawnedRanksAllocator<FakeExecutor>>,
    executor: &FakeExecutor,
) {
    for _ in 0..1000 {
        if runner.is_done() {
            return;
        }
        runner.step().unwrap();
        for instance in runner.historic() {
            if !instance.is_finished() {
                executor.signal(instance.id());
            }
        }
    }
    panic!("runner did not finish");
}

#[test]
fn wide_command_runs_alone_then_narrow_ones_share_the_pool() {
    let executor = FakeExecutor::default();
    let catalog = catalog(&[("y", 4, 50), ("z", 4, 40), ("x", 8, 100)]);
    let mut runner = runner(&catalog, 8, executor.clone());

    runner.step().unwrap();
    assert_eq!(executor.launched(), ["x"]);
    assert_eq!(runner.allocator().free_ranks(), 0);

    executor.signal("x");
    runner.step().unwrap();
    runner.step().unwrap();
    runner.step().unwrap();
    assert_eq!(executor.launched(), ["x", "y", "z"]);
    assert_eq!(runner.running_len(), 2);

    let historic = runner.historic();
    let (x, y, z) = (&historic[0], &historic[1], &historic[2]);
    assert_eq!((y.starting_rank(), y.last_rank()), (0, 3));
    assert_eq!((z.starting_rank(), z.last_rank()), (4, 7));
    assert!(x.finished_at().unwrap() <= y.started_at());
    assert!(x.finished_at().unwrap() <= z.started_at());
}

#[test]
fn granted_ranks_never_exceed_the_pool() {
    let catalog = catalog(&[
        ("a", 3, 9),
        ("b", 1, 2),
        ("c", 5, 1),
        ("d", 2, 7),
        ("e", 1, 1),
        ("f", 4, 4),
        ("g", 2, 2),
    ]);
    let mut runner = runner(&catalog, 6, FakeExecutor::auto());
    drain(&mut runner);

    assert_eq!(runner.historic().len(), 7);
    assert!(runner.historic().iter().all(Instance::is_finished));
    assert!(runner.allocator().all_ranks_available());
}

#[tokio::test]
async fn run_admits_and_finishes_everything() {
    let catalog = catalog(&[("a", 2, 1), ("b", 1, 1), ("c", 4, 1), ("d", 3, 1), ("e", 1, 1)]);
    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(4, FakeExecutor::auto()),
        None,
        fast_options(),
    )
    .unwrap();

    let report = runner.run().await.unwrap();
    assert_eq!(report.admitted, 5);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.total_ranks, 4);
    assert!(report.end >= report.begin);

    let mut ids: Vec<&str> = runner.historic().iter().map(Instance::id).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["a", "b", "c", "d", "e"]);
    assert!(runner.historic().iter().all(Instance::is_finished));
    assert_eq!(runner.pending_len(), 0);
    assert_eq!(runner.running_len(), 0);
}

#[tokio::test]
async fn empty_catalog_finishes_immediately() {
    let mut runner = CommandsRunner::new(
        &CommandCatalog::new(),
        SpawnedRanksAllocator::new(4, FakeExecutor::default()),
        None,
        fast_options(),
    )
    .unwrap();

    assert!(runner.is_done());
    let report = runner.run().await.unwrap();
    assert_eq!(report.admitted, 0);
    assert!(runner.historic().is_empty());
}

#[test]
fn failed_launch_keeps_the_head() {
    let executor = FakeExecutor::default();
    executor.fail("h", 2);
    let catalog = catalog(&[("l", 1, 1), ("h", 4, 1)]);
    let mut runner = runner(&catalog, 4, executor.clone());

    assert!(!runner.step().unwrap());
    assert!(!runner.step().unwrap());
    assert_eq!(runner.launch_failures(), 2);
    assert!(executor.launched().is_empty());
    assert_eq!(runner.pending_ids(), ["h", "l"]);
    assert!(runner.allocator().all_ranks_available());

    assert!(runner.step().unwrap());
    assert_eq!(executor.launched(), ["h"]);
    assert_eq!(runner.historic()[0].id(), "h");
    assert_eq!(runner.pending_ids(), ["l"]);
}

#[test]
fn launch_retries_can_be_bounded() {
    let executor = FakeExecutor::default();
    executor.fail("h", 5);
    let catalog = catalog(&[("h", 2, 1)]);
    let options = RunnerOptions {
        max_launch_attempts: Some(3),
        ..RunnerOptions::default()
    };
    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(4, executor),
        None,
        options,
    )
    .unwrap();

    assert!(!runner.step().unwrap());
    assert!(!runner.step().unwrap());
    let err = runner.step().unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::LaunchRetriesExhausted { ref id, attempts: 3, .. } if id == "h"
    ));
    assert!(runner.allocator().all_ranks_available());
}

#[test]
fn duplicate_completion_signals_are_absorbed() {
    let executor = FakeExecutor::default();
    let catalog = catalog(&[("x", 8, 1), ("y", 8, 1)]);
    let mut runner = runner(&catalog, 8, executor.clone());

    runner.step().unwrap();
    executor.signal("x");
    executor.signal("x");
    runner.step().unwrap();
    let finished_at = runner.historic()[0].finished_at().unwrap();

    executor.signal("x");
    runner.step().unwrap();
    runner.step().unwrap();

    assert_eq!(runner.historic()[0].finished_at(), Some(finished_at));
    assert_eq!(executor.launched(), ["x", "y"]);
    assert_eq!(runner.running_len(), 1);
    assert_eq!(runner.allocator().free_ranks(), 0);
}

#[test]
fn signals_for_unknown_commands_are_ignored() {
    let executor = FakeExecutor::default();
    let catalog = catalog(&[("a", 2, 1)]);
    let mut runner = runner(&catalog, 4, executor.clone());

    runner.step().unwrap();
    executor.signal("stranger");
    assert!(!runner.step().unwrap());
    assert_eq!(runner.running_len(), 1);
}

#[test]
fn commands_wider_than_the_pool_are_rejected() {
    let catalog = catalog(&[("ok", 4, 1), ("huge", 9, 1)]);
    let result = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(8, FakeExecutor::default()),
        None,
        RunnerOptions::default(),
    );

    assert!(matches!(
        result,
        Err(SchedulerError::UnsatisfiableCommand { ref id, requested: 9, available: 8 }) if id == "huge"
    ));
}

#[test]
fn checkpointed_commands_are_skipped() {
    let store = CheckpointStore::open_in_memory().unwrap();
    store.mark_done("a", 10).unwrap();
    store.mark_done("c", 10).unwrap();

    let catalog = catalog(&[("a", 1, 1), ("b", 1, 1), ("c", 1, 1), ("d", 1, 1), ("e", 1, 1)]);
    let runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(2, FakeExecutor::default()),
        Some(store),
        RunnerOptions::default(),
    )
    .unwrap();

    assert_eq!(runner.skipped(), 2);
    assert_eq!(runner.pending_len(), 3);
    assert_eq!(runner.pending_ids(), ["b", "d", "e"]);
}

#[tokio::test]
async fn completions_are_checkpointed() {
    let store = CheckpointStore::open_in_memory().unwrap();
    let catalog = catalog(&[("a", 1, 1), ("b", 2, 1)]);
    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(2, FakeExecutor::auto()),
        Some(store.clone()),
        fast_options(),
    )
    .unwrap();

    runner.run().await.unwrap();
    assert!(store.is_done("a").unwrap());
    assert!(store.is_done("b").unwrap());

    // A second run over the same checkpoint has nothing to do.
    let rerun = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(2, FakeExecutor::auto()),
        Some(store),
        fast_options(),
    )
    .unwrap();
    assert_eq!(rerun.skipped(), 2);
    assert!(rerun.is_done());
}

#[tokio::test]
async fn completions_are_not_checkpointed_when_disabled() {
    let store = CheckpointStore::open_in_memory().unwrap();
    let catalog = catalog(&[("a", 1, 1)]);
    let options = RunnerOptions {
        persist_completions: false,
        ..fast_options()
    };
    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(2, FakeExecutor::auto()),
        Some(store.clone()),
        options,
    )
    .unwrap();

    runner.run().await.unwrap();
    assert!(!store.is_done("a").unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn runs_real_processes() {
    use rank_runtime::{CompletionMode, ProcessConfig, ProcessExecutor};

    let tmp = tempfile::tempdir().unwrap();
    let mut catalog = CommandCatalog::new();
    for (id, ranks) in [("left", 2), ("right", 2), ("wide", 4)] {
        let args = ["sh", "-c", "sleep 0.05"].map(String::from).to_vec();
        catalog
            .add(Command::new(id, false, ranks, 1, args).unwrap())
            .unwrap();
    }

    let executor = ProcessExecutor::new(
        ProcessConfig {
            log_dir: Some(tmp.path().join("logs")),
            ..ProcessConfig::default()
        },
        CompletionMode::ProcessExit,
    );
    let store = CheckpointStore::open(&tmp.path().join("checkpoint.redb")).unwrap();
    let mut runner = CommandsRunner::new(
        &catalog,
        SpawnedRanksAllocator::new(4, executor),
        Some(store.clone()),
        RunnerOptions {
            poll_interval: Duration::from_millis(5),
            ..RunnerOptions::default()
        },
    )
    .unwrap();

    let report = runner.run().await.unwrap();
    assert_eq!(report.admitted, 3);

    let historic = runner.historic();
    assert_eq!(historic[0].id(), "wide");
    assert!(historic[0].finished_at().unwrap() <= historic[1].started_at());
    assert!(historic.iter().all(Instance::is_finished));
    assert_eq!(store.completed().unwrap().len(), 3);
    assert!(tmp.path().join("logs").join("wide.log").exists());
}
