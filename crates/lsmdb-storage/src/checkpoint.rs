//! Checkpoint header - the durable root of the database
//!
//! Block 0 holds two header slots. Checkpoints write them alternately, so a
//! torn header write always leaves the previous one intact. On open the
//! valid slot with the highest checkpoint id wins.
//!
//! ```text
//! +-------+---------+-----------+----------+-----+------------------+-------+
//! | magic | version | page_size | block_kb | len | body (bincode)   | crc32 |
//! | u32   | u16     | u32       | u32      | u32 | len bytes        | u32   |
//! +-------+---------+-----------+----------+-----+------------------+-------+
//! ```

use crate::segment::SegmentMeta;
use lsmdb_core::format_version::{header_version, magic, HEADER_FORMAT_VERSION};
use lsmdb_core::{DbFile, Error, Result};
use lsmdb_wal::WalPosition;
use serde::{Deserialize, Serialize};

/// Size of each header slot
pub const HEADER_SLOT_SIZE: u64 = 32 * 1024;

const PREFIX_LEN: usize = 4 + 2 + 4 + 4 + 4;

/// What a checkpoint makes durable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    /// Increases with every header written
    pub checkpoint_id: u64,
    /// Live segments, newest first
    pub segments: Vec<SegmentMeta>,
    /// Where log replay starts
    pub wal_start: WalPosition,
    /// First LSN not covered by the segments
    pub wal_lsn: u64,
    pub next_segment_id: u64,
}

/// File geometry recorded next to every header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub page_size: u32,
    pub block_size_kb: u32,
}

/// A header as found on disk
#[derive(Debug, Clone)]
pub struct LoadedHeader {
    pub header: CheckpointHeader,
    pub geometry: Geometry,
    /// Slot the header was read from
    pub slot: usize,
}

fn slot_offset(slot: usize) -> u64 {
    slot as u64 * HEADER_SLOT_SIZE
}

/// Serializes `header` into slot `slot` (0 or 1). The caller syncs.
pub fn write_header(
    file: &DbFile,
    slot: usize,
    geometry: Geometry,
    header: &CheckpointHeader,
) -> Result<()> {
    let body = bincode::serialize(header).map_err(|e| Error::Serialization(e.to_string()))?;
    if (PREFIX_LEN + body.len() + 4) as u64 > HEADER_SLOT_SIZE {
        return Err(Error::Storage(format!(
            "checkpoint header of {} bytes does not fit its slot",
            body.len()
        )));
    }

    let mut buf = Vec::with_capacity(PREFIX_LEN + body.len() + 4);
    buf.extend_from_slice(&magic::HEADER.to_le_bytes());
    buf.extend_from_slice(&HEADER_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&geometry.page_size.to_le_bytes());
    buf.extend_from_slice(&geometry.block_size_kb.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&body);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    file.write_raw(slot_offset(slot), &buf)
}

/// Decodes one slot; `None` if it does not hold a valid header.
fn read_slot(file: &DbFile, slot: usize) -> Result<Option<(CheckpointHeader, Geometry)>> {
    let mut buf = vec![0u8; HEADER_SLOT_SIZE as usize];
    if file.read_raw(slot_offset(slot), &mut buf)? < PREFIX_LEN {
        return Ok(None);
    }

    let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
    if u32_at(0) != magic::HEADER {
        return Ok(None);
    }
    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if !header_version().can_read(version) {
        return Err(Error::Corruption(format!(
            "unsupported header version {}",
            version
        )));
    }
    let geometry = Geometry {
        page_size: u32_at(6),
        block_size_kb: u32_at(10),
    };
    let len = u32_at(14) as usize;
    let end = PREFIX_LEN + len;
    if end + 4 > buf.len() || crc32fast::hash(&buf[..end]) != u32_at(end) {
        return Ok(None);
    }

    match bincode::deserialize(&buf[PREFIX_LEN..end]) {
        Ok(header) => Ok(Some((header, geometry))),
        Err(_) => Ok(None),
    }
}

/// Reads both slots and returns the newest valid header.
pub fn read_header(file: &DbFile) -> Result<LoadedHeader> {
    let mut best: Option<LoadedHeader> = None;
    for slot in 0..2 {
        if let Some((header, geometry)) = read_slot(file, slot)? {
            if best
                .as_ref()
                .is_none_or(|b| header.checkpoint_id > b.header.checkpoint_id)
            {
                best = Some(LoadedHeader {
                    header,
                    geometry,
                    slot,
                });
            }
        }
    }
    best.ok_or_else(|| Error::Corruption("no valid database header found".into()))
}
