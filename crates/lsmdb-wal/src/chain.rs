// WAL block chain
//
// The log lives in ordinary file blocks linked into a chain. Each block's
// last 8 bytes hold the id of the next block (little endian, 0 = none); the
// rest is a byte stream of record frames, which may straddle blocks.

use lsmdb_core::{BlockId, DbFile, Result};
use serde::{Deserialize, Serialize};

/// Size of the trailing link in every log block.
pub const LINK_SIZE: u64 = 8;

/// A position in the log: a block and a byte offset into its data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalPosition {
    pub block: BlockId,
    pub offset: u64,
}

impl WalPosition {
    pub fn new(block: BlockId, offset: u64) -> Self {
        Self { block, offset }
    }

    /// Start of `block`.
    pub fn start_of(block: BlockId) -> Self {
        Self::new(block, 0)
    }
}

/// Bytes of frame data each log block can hold.
pub fn data_capacity(file: &DbFile) -> u64 {
    file.block_bytes() - LINK_SIZE
}

/// Absolute file offset of `pos`.
pub fn file_offset(file: &DbFile, pos: WalPosition) -> u64 {
    file.block_offset(pos.block) + pos.offset
}

/// Points `from`'s link at `to`.
pub fn write_link(file: &DbFile, from: BlockId, to: BlockId) -> Result<()> {
    let offset = file.block_offset(from) + data_capacity(file);
    file.write_raw(offset, &to.to_le_bytes())
}

/// Reads `block`'s link. Returns `None` for an unset link.
pub fn read_link(file: &DbFile, block: BlockId) -> Result<Option<BlockId>> {
    let offset = file.block_offset(block) + data_capacity(file);
    let mut buf = [0u8; LINK_SIZE as usize];
    file.read_raw(offset, &mut buf)?;
    let next = u64::from_le_bytes(buf);
    Ok((next != 0).then_some(next))
}
