use std::path::Path;

use anyhow::bail;
use rank_core::CommandCatalog;
use rankgrid_scheduler::PendingQueue;

pub fn check(commands: &Path, ranks: Option<u32>) -> anyhow::Result<()> {
    let catalog = CommandCatalog::from_file(commands)?;

    println!(
        "{} commands, widest needs {} ranks",
        catalog.len(),
        catalog.max_ranks()
    );
    for line in admission_lines(&catalog) {
        println!("{line}");
    }

    if let Some(ranks) = ranks {
        let too_wide = unsatisfiable(&catalog, ranks);
        if !too_wide.is_empty() {
            bail!(
                "{} command(s) need more than {ranks} ranks: {}",
                too_wide.len(),
                too_wide.join(", ")
            );
        }
        println!("✓ every command fits in {ranks} ranks");
    }
    Ok(())
}

/// One numbered line per command, in admission order.
fn admission_lines(catalog: &CommandCatalog) -> Vec<String> {
    let queue = PendingQueue::new(catalog.all().to_vec());
    queue
        .remaining()
        .iter()
        .enumerate()
        .map(|(i, command)| format!("{:>4}. {command}", i + 1))
        .collect()
}

fn unsatisfiable(catalog: &CommandCatalog, ranks: u32) -> Vec<&str> {
    catalog
        .all()
        .iter()
        .filter(|c| c.ranks() > ranks)
        .map(|c| c.id())
        .collect()
}
