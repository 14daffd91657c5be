// WAL reader module - walks the block chain and decodes frames
//
// The reader handles:
// 1. Following block links, rejecting links that leave the file or loop
// 2. Decoding frames that straddle block boundaries
// 3. Finding the end of the log: the first frame that fails its CRC, or
//    whose LSN does not increase, marks the end. That is a torn or stale
//    tail, not corruption.

use crate::chain::{self, WalPosition};
use crate::record::WalRecord;
use lsmdb_core::{BlockId, DbFile, Result};
use std::collections::HashSet;

/// WAL reader over a block chain
pub struct WalReader<'a> {
    file: &'a DbFile,
    total_blocks: BlockId,
    position: WalPosition,
    /// Blocks traversed so far, in chain order
    blocks: Vec<BlockId>,
    visited: HashSet<BlockId>,
    min_lsn: u64,
    last_lsn: Option<u64>,
}

/// Cursor state while reading one frame; committed only if the frame is valid.
struct Walk {
    position: WalPosition,
    new_blocks: Vec<BlockId>,
}

impl<'a> WalReader<'a> {
    /// Reads the chain starting at `start`, accepting only frames whose LSN
    /// is at least `min_lsn`.
    pub fn new(file: &'a DbFile, start: WalPosition, min_lsn: u64) -> Result<Self> {
        let total_blocks = file.block_count()?;
        let mut visited = HashSet::new();
        visited.insert(start.block);
        Ok(Self {
            file,
            total_blocks,
            position: start,
            blocks: vec![start.block],
            visited,
            min_lsn,
            last_lsn: None,
        })
    }

    /// Read the next record from the WAL
    ///
    /// Returns `Ok(None)` at the end of the log. Only I/O failures are errors.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        if self.position.block == 0 || self.position.block >= self.total_blocks {
            return Ok(None);
        }

        let mut walk = Walk {
            position: self.position,
            new_blocks: Vec::new(),
        };

        let mut prefix = [0u8; 4];
        if !self.read_into(&mut walk, &mut prefix)? {
            return Ok(None);
        }
        let Some(frame_len) = WalRecord::frame_len(prefix) else {
            return Ok(None);
        };

        let mut frame = vec![0u8; frame_len];
        frame[..4].copy_from_slice(&prefix);
        if !self.read_into(&mut walk, &mut frame[4..])? {
            return Ok(None);
        }

        let Ok((record, _)) = WalRecord::decode(&frame) else {
            return Ok(None);
        };
        let in_order = match self.last_lsn {
            Some(last) => record.lsn > last,
            None => record.lsn >= self.min_lsn,
        };
        if !in_order {
            return Ok(None);
        }

        self.last_lsn = Some(record.lsn);
        self.position = walk.position;
        for block in walk.new_blocks {
            self.visited.insert(block);
            self.blocks.push(block);
        }
        Ok(Some(record))
    }

    /// Fills `buf` from the walk's position, following links as needed.
    /// Returns `false` if the chain ends or a link is invalid.
    fn read_into(&self, walk: &mut Walk, buf: &mut [u8]) -> Result<bool> {
        let capacity = chain::data_capacity(self.file);
        let mut filled = 0;
        while filled < buf.len() {
            if walk.position.offset >= capacity {
                let Some(next) = chain::read_link(self.file, walk.position.block)? else {
                    return Ok(false);
                };
                let seen = self.visited.contains(&next) || walk.new_blocks.contains(&next);
                if next >= self.total_blocks || seen {
                    return Ok(false);
                }
                walk.new_blocks.push(next);
                walk.position = WalPosition::start_of(next);
            }
            let room = (capacity - walk.position.offset) as usize;
            let n = room.min(buf.len() - filled);
            let offset = chain::file_offset(self.file, walk.position);
            if self.file.read_raw(offset, &mut buf[filled..filled + n])? < n {
                return Ok(false);
            }
            walk.position.offset += n as u64;
            filled += n;
        }
        Ok(true)
    }

    /// Position just past the last record returned.
    pub fn position(&self) -> WalPosition {
        self.position
    }

    /// Chain blocks traversed through the current position.
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// LSN of the last record returned.
    pub fn last_lsn(&self) -> Option<u64> {
        self.last_lsn
    }

    /// Read all remaining records into a vector
    pub fn read_all(&mut self) -> Result<Vec<WalRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Iterator implementation for WalReader
impl Iterator for WalReader<'_> {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
