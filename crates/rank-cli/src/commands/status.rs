use std::path::Path;

use rank_core::CommandCatalog;
use rankgrid_state::{CheckpointRecord, CheckpointStore};

use super::load_config;

pub fn status(commands: &Path, output_dir: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let catalog = CommandCatalog::from_file(commands)?;
    let path = config.checkpoint_path(output_dir);

    let (done, pending) = if path.exists() {
        split_by_checkpoint(&catalog, &CheckpointStore::open(&path)?)?
    } else {
        (
            Vec::new(),
            catalog.all().iter().map(|c| c.id().to_string()).collect(),
        )
    };

    println!("{} done, {} pending", done.len(), pending.len());
    for record in &done {
        println!("  done     {} ({}ms)", record.id, record.elapsed_ms);
    }
    for id in &pending {
        println!("  pending  {id}");
    }
    Ok(())
}

pub fn reset(output_dir: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let path = config.checkpoint_path(output_dir);
    if !path.exists() {
        println!("No checkpoint at {}", path.display());
        return Ok(());
    }

    let removed = CheckpointStore::open(&path)?.reset()?;
    println!("✓ Forgot {removed} completed commands");
    Ok(())
}

/// Catalog commands recorded as done, and the ids of the rest, both in
/// catalog order.
fn split_by_checkpoint(
    catalog: &CommandCatalog,
    store: &CheckpointStore,
) -> anyhow::Result<(Vec<CheckpointRecord>, Vec<String>)> {
    let mut done = Vec::new();
    let mut pending = Vec::new();
    for command in catalog.all() {
        match store.get(command.id())? {
            Some(record) => done.push(record),
            None => pending.push(command.id().to_string()),
        }
    }
    Ok((done, pending))
}
