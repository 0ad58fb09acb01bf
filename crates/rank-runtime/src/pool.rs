//! Rank pool: positional bookkeeping of the fixed rank set.
//!
//! Each rank index records which command holds it. Grants are contiguous
//! and placed first-fit at the lowest free index, so the executor can be
//! told exactly which indices to bind to.

use tracing::debug;

use crate::error::{AllocError, AllocResult};

#[derive(Debug, Clone)]
pub struct RankPool {
    /// Holder of each rank index, `None` when free.
    slots: Vec<Option<String>>,
    free: u32,
}

impl RankPool {
    pub fn new(total: u32) -> Self {
        Self {
            slots: vec![None; total as usize],
            free: total,
        }
    }

    pub fn total(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn free_count(&self) -> u32 {
        self.free
    }

    pub fn granted_count(&self) -> u32 {
        self.total() - self.free
    }

    pub fn is_idle(&self) -> bool {
        self.free == self.total()
    }

    /// Lowest starting index of a free contiguous block of `ranks` ranks.
    pub fn find_block(&self, ranks: u32) -> Option<u32> {
        if ranks == 0 || ranks > self.free {
            return None;
        }
        let ranks = ranks as usize;
        let mut run = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                run = 0;
                continue;
            }
            run += 1;
            if run == ranks {
                return Some((index + 1 - ranks) as u32);
            }
        }
        None
    }

    /// Reserve a contiguous block for `owner`, returning its first index.
    pub fn reserve(&mut self, owner: &str, ranks: u32) -> AllocResult<u32> {
        let start = self
            .find_block(ranks)
            .ok_or_else(|| AllocError::InsufficientRanks {
                id: owner.to_string(),
                requested: ranks,
                free: self.free,
                total: self.total(),
            })?;
        for slot in &mut self.slots[start as usize..(start + ranks) as usize] {
            *slot = Some(owner.to_string());
        }
        self.free -= ranks;
        debug!(owner, first_rank = start, ranks, free = self.free, "ranks reserved");
        Ok(start)
    }

    /// Release a block previously reserved by `owner`.
    ///
    /// Every rank of the block must be held by `owner`; otherwise nothing
    /// is released and an error is returned.
    pub fn release(&mut self, owner: &str, start: u32, ranks: u32) -> AllocResult<()> {
        let end = start as usize + ranks as usize;
        if end > self.slots.len() {
            return Err(AllocError::RankNotHeld {
                id: owner.to_string(),
                rank: self.total(),
            });
        }
        if let Some(offset) = self.slots[start as usize..end]
            .iter()
            .position(|slot| slot.as_deref() != Some(owner))
        {
            return Err(AllocError::RankNotHeld {
                id: owner.to_string(),
                rank: start + offset as u32,
            });
        }
        for slot in &mut self.slots[start as usize..end] {
            *slot = None;
        }
        self.free += ranks;
        debug!(owner, first_rank = start, ranks, free = self.free, "ranks released");
        Ok(())
    }

    /// Command currently holding `rank`, if any.
    pub fn holder(&self, rank: u32) -> Option<&str> {
        self.slots.get(rank as usize).and_then(|s| s.as_deref())
    }
}
