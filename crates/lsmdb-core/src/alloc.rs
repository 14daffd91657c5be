//! Block allocation.
//!
//! The free list is not persisted: on open it is rebuilt from the set of
//! blocks the last checkpoint header (and the log chain) still reference.
//! Blocks released while a durable header may still point at them wait in
//! a pending list until the next header is written.

use crate::file::BlockId;
use std::collections::BTreeSet;

/// First block available for data; block 0 holds the header slots.
pub const FIRST_DATA_BLOCK: BlockId = 1;

/// Tracks free, pending and never-used blocks.
#[derive(Debug, Clone)]
pub struct BlockAllocator {
    free: BTreeSet<BlockId>,
    pending: Vec<BlockId>,
    next_block: BlockId,
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator {
    /// Allocator for a fresh file.
    pub fn new() -> Self {
        Self {
            free: BTreeSet::new(),
            pending: Vec::new(),
            next_block: FIRST_DATA_BLOCK,
        }
    }

    /// Rebuilds the allocator for a file spanning `total_blocks` blocks, of
    /// which `used` are referenced. Everything else is free.
    pub fn rebuild(total_blocks: BlockId, used: impl IntoIterator<Item = BlockId>) -> Self {
        let used: BTreeSet<BlockId> = used.into_iter().collect();
        let next_block = total_blocks
            .max(used.last().map_or(0, |b| b + 1))
            .max(FIRST_DATA_BLOCK);
        let free = (FIRST_DATA_BLOCK..next_block)
            .filter(|b| !used.contains(b))
            .collect();
        Self {
            free,
            pending: Vec::new(),
            next_block,
        }
    }

    /// Hands out the lowest free block, growing the file when none is free.
    pub fn allocate(&mut self) -> BlockId {
        if let Some(block) = self.free.pop_first() {
            return block;
        }
        let block = self.next_block;
        self.next_block += 1;
        block
    }

    /// Marks blocks as unreferenced by the in-memory state. They stay
    /// unavailable until [`BlockAllocator::reclaim`] returns them.
    pub fn release(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        self.pending.extend(blocks);
    }

    /// Takes the pending list, to be reclaimed once a header that no
    /// longer references it is durable.
    pub fn take_pending(&mut self) -> Vec<BlockId> {
        std::mem::take(&mut self.pending)
    }

    /// Returns blocks to the free list.
    pub fn reclaim(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        self.free.extend(blocks);
    }

    /// Number of blocks immediately reusable.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of blocks waiting for a checkpoint.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// One past the highest block handed out so far.
    pub fn high_water(&self) -> BlockId {
        self.next_block
    }
}
