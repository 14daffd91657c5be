// WAL writer module - appends record frames to the block chain
use crate::chain::{self, WalPosition};
use crate::record::WalRecord;
use lsmdb_core::{BlockAllocator, BlockId, DbFile, Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::trace;

pub struct WalWriter {
    file: Arc<DbFile>,
    alloc: Arc<Mutex<BlockAllocator>>,
    position: WalPosition,
    /// Chain blocks from the checkpointed start through `position.block`
    blocks: VecDeque<BlockId>,
    next_lsn: u64,
}

impl WalWriter {
    /// Starts a new chain in a freshly allocated block.
    pub fn create(
        file: Arc<DbFile>,
        alloc: Arc<Mutex<BlockAllocator>>,
        next_lsn: u64,
    ) -> Result<Self> {
        let head = alloc.lock().map_err(|_| Error::LockPoisoned)?.allocate();
        Ok(Self {
            file,
            alloc,
            position: WalPosition::start_of(head),
            blocks: VecDeque::from([head]),
            next_lsn,
        })
    }

    /// Continues an existing chain at `position`. `blocks` lists the chain
    /// from its start through `position.block`.
    pub fn resume(
        file: Arc<DbFile>,
        alloc: Arc<Mutex<BlockAllocator>>,
        position: WalPosition,
        blocks: Vec<BlockId>,
        next_lsn: u64,
    ) -> Result<Self> {
        if blocks.last() != Some(&position.block) {
            return Err(Error::Storage(format!(
                "log chain does not end at resume block {}",
                position.block
            )));
        }
        Ok(Self {
            file,
            alloc,
            position,
            blocks: blocks.into(),
            next_lsn,
        })
    }

    /// Appends records as one contiguous write, assigning consecutive LSNs.
    /// Returns the number of bytes written.
    pub fn append(&mut self, records: Vec<WalRecord>) -> Result<u64> {
        let mut buf = Vec::new();
        let mut lsn = self.next_lsn;
        for record in records {
            buf.extend_from_slice(&record.with_lsn(lsn).encode()?);
            lsn += 1;
        }
        self.write_bytes(&buf)?;
        trace!(first_lsn = self.next_lsn, last_lsn = lsn - 1, bytes = buf.len(), "WAL append");
        self.next_lsn = lsn;
        Ok(buf.len() as u64)
    }

    fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        let capacity = chain::data_capacity(&self.file);
        while !data.is_empty() {
            if self.position.offset >= capacity {
                let next = self.alloc.lock().map_err(|_| Error::LockPoisoned)?.allocate();
                // The link lands before the block's first frame.
                chain::write_link(&self.file, self.position.block, next)?;
                self.blocks.push_back(next);
                self.position = WalPosition::start_of(next);
            }
            let room = (capacity - self.position.offset) as usize;
            let n = room.min(data.len());
            self.file
                .write_raw(chain::file_offset(&self.file, self.position), &data[..n])?;
            self.position.offset += n as u64;
            data = &data[n..];
        }
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync()
    }

    /// Drops chain blocks before `start.block` and returns them for reuse.
    pub fn truncate_before(&mut self, start: WalPosition) -> Vec<BlockId> {
        let mut released = Vec::new();
        if !self.blocks.contains(&start.block) {
            return released;
        }
        while let Some(&front) = self.blocks.front() {
            if front == start.block {
                break;
            }
            released.push(front);
            self.blocks.pop_front();
        }
        released
    }

    /// Position the next frame will be written at.
    pub fn position(&self) -> WalPosition {
        self.position
    }

    /// LSN the next frame will carry.
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Blocks currently in the chain.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockId> {
        self.blocks.iter()
    }
}
