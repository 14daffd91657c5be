//! Segment - immutable sorted run stored in file blocks
//!
//! A segment is written once, from a memtable or a merge, and never
//! modified. Its bytes form a logical stream laid over a list of blocks.
//!
//! ## Layout
//!
//! ```text
//! +------------------+
//! | Data Chunks      |  <- length-prefixed entries + CRC, about one page each
//! +------------------+
//! | Index            |  <- first key and location of every chunk
//! +------------------+
//! ```
//!
//! The index location and checksum live in the segment's [`SegmentMeta`],
//! which the checkpoint header records.

use crate::memtable::MemtableEntry;
use crate::view::{Seek, SortedSource};
use lsmdb_core::format_version::{magic, segment_version, SEGMENT_FORMAT_VERSION};
use lsmdb_core::{BlockAllocator, BlockId, DbFile, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A run of contiguous blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub start: BlockId,
    pub len: u64,
}

/// Collapses a block list into extents, keeping order.
pub fn extents_of(blocks: &[BlockId]) -> Vec<Extent> {
    let mut extents: Vec<Extent> = Vec::new();
    for &block in blocks {
        match extents.last_mut() {
            Some(last) if last.start + last.len == block => last.len += 1,
            _ => extents.push(Extent {
                start: block,
                len: 1,
            }),
        }
    }
    extents
}

/// Persistent description of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Unique, increasing with age (newer segments have larger ids)
    pub id: u64,
    /// Blocks holding the segment, in logical order
    pub extents: Vec<Extent>,
    /// Logical length, index included
    pub data_len: u64,
    pub index_offset: u64,
    pub index_len: u32,
    pub index_crc: u32,
    pub entry_count: u64,
}

impl SegmentMeta {
    /// Blocks in logical order.
    pub fn blocks(&self) -> Vec<BlockId> {
        self.extents
            .iter()
            .flat_map(|e| e.start..e.start + e.len)
            .collect()
    }
}

/// A single entry in a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub key: Vec<u8>,
    /// `None` is a tombstone
    pub value: Option<Vec<u8>>,
}

impl SegmentEntry {
    pub fn new(key: Vec<u8>, entry: MemtableEntry) -> Self {
        let value = match entry {
            MemtableEntry::Value(v) => Some(v),
            MemtableEntry::Tombstone => None,
        };
        Self { key, value }
    }

    /// Check if this is a tombstone
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    pub fn into_parts(self) -> (Vec<u8>, MemtableEntry) {
        let entry = match self.value {
            Some(v) => MemtableEntry::Value(v),
            None => MemtableEntry::Tombstone,
        };
        (self.key, entry)
    }
}

/// Index entry pointing to a data chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// First key in the chunk
    pub first_key: Vec<u8>,
    /// Logical offset of the chunk
    pub offset: u64,
    /// Size of the chunk in bytes, CRC included
    pub size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentIndex {
    magic: u32,
    version: u16,
    chunks: Vec<IndexEntry>,
    last_key: Vec<u8>,
    entry_count: u64,
}

fn block_position(file: &DbFile, blocks: &[BlockId], logical: u64) -> Result<(u64, u64)> {
    let block_bytes = file.block_bytes();
    let idx = (logical / block_bytes) as usize;
    let block = blocks.get(idx).ok_or_else(|| {
        Error::Corruption(format!("segment offset {} lies outside its blocks", logical))
    })?;
    let within = logical % block_bytes;
    Ok((file.block_offset(*block) + within, block_bytes - within))
}

/// Segment writer - lays a sorted run over freshly allocated blocks
pub struct SegmentWriter {
    file: Arc<DbFile>,
    alloc: Arc<Mutex<BlockAllocator>>,
    id: u64,
    blocks: Vec<BlockId>,
    /// Logical bytes written so far
    position: u64,
    index: Vec<IndexEntry>,
    chunk: Vec<u8>,
    chunk_first_key: Option<Vec<u8>>,
    chunk_target: usize,
    last_key: Option<Vec<u8>>,
    entry_count: u64,
}

impl SegmentWriter {
    pub fn new(file: Arc<DbFile>, alloc: Arc<Mutex<BlockAllocator>>, id: u64) -> Self {
        let chunk_target = file.page_size() as usize;
        Self {
            file,
            alloc,
            id,
            blocks: Vec::new(),
            position: 0,
            index: Vec::new(),
            chunk: Vec::with_capacity(chunk_target),
            chunk_first_key: None,
            chunk_target,
            last_key: None,
            entry_count: 0,
        }
    }

    /// Add an entry. Keys must arrive in strictly increasing order.
    pub fn add(&mut self, entry: SegmentEntry) -> Result<()> {
        if let Some(last) = &self.last_key {
            if entry.key <= *last {
                return Err(Error::Storage("segment keys out of order".into()));
            }
        }

        if self.chunk_first_key.is_none() {
            self.chunk_first_key = Some(entry.key.clone());
        }

        let encoded =
            bincode::serialize(&entry).map_err(|e| Error::Serialization(e.to_string()))?;
        self.chunk
            .extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        self.chunk.extend_from_slice(&encoded);

        self.last_key = Some(entry.key);
        self.entry_count += 1;

        if self.chunk.len() >= self.chunk_target {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let Some(first_key) = self.chunk_first_key.take() else {
            return Ok(());
        };
        let crc = crc32fast::hash(&self.chunk);
        self.chunk.extend_from_slice(&crc.to_le_bytes());

        self.index.push(IndexEntry {
            first_key,
            offset: self.position,
            size: self.chunk.len() as u32,
        });

        let chunk = std::mem::take(&mut self.chunk);
        self.write_stream(&chunk)?;
        self.chunk = chunk;
        self.chunk.clear();
        Ok(())
    }

    /// Appends to the logical stream, allocating blocks as it grows.
    fn write_stream(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if self.position / self.file.block_bytes() == self.blocks.len() as u64 {
                let block = self
                    .alloc
                    .lock()
                    .map_err(|_| Error::LockPoisoned)?
                    .allocate();
                self.blocks.push(block);
            }
            let (offset, room) = block_position(&self.file, &self.blocks, self.position)?;
            let n = (room as usize).min(data.len());
            self.file.write_pages(offset, &data[..n])?;
            self.position += n as u64;
            data = &data[n..];
        }
        Ok(())
    }

    /// Writes the index and returns the segment's description.
    pub fn finish(mut self) -> Result<SegmentMeta> {
        self.flush_chunk()?;

        let index = SegmentIndex {
            magic: magic::SEGMENT,
            version: SEGMENT_FORMAT_VERSION,
            chunks: std::mem::take(&mut self.index),
            last_key: self.last_key.take().unwrap_or_default(),
            entry_count: self.entry_count,
        };
        let encoded =
            bincode::serialize(&index).map_err(|e| Error::Serialization(e.to_string()))?;
        let index_offset = self.position;
        self.write_stream(&encoded)?;

        Ok(SegmentMeta {
            id: self.id,
            extents: extents_of(&self.blocks),
            data_len: self.position,
            index_offset,
            index_len: encoded.len() as u32,
            index_crc: crc32fast::hash(&encoded),
            entry_count: self.entry_count,
        })
    }

    /// Gives back every block written so far. They were never published,
    /// so they are free immediately.
    pub fn abandon(self) -> Result<()> {
        self.alloc
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .reclaim(self.blocks.iter().copied());
        Ok(())
    }
}

/// An open segment: its description plus the loaded chunk index.
#[derive(Debug)]
pub struct Segment {
    file: Arc<DbFile>,
    meta: SegmentMeta,
    blocks: Vec<BlockId>,
    index: Vec<IndexEntry>,
    last_key: Vec<u8>,
}

impl Segment {
    /// Loads and verifies the index of the segment `meta` describes.
    pub fn open(file: Arc<DbFile>, meta: SegmentMeta) -> Result<Self> {
        let blocks = meta.blocks();
        let mut segment = Self {
            file,
            meta,
            blocks,
            index: Vec::new(),
            last_key: Vec::new(),
        };

        let mut buf = vec![0u8; segment.meta.index_len as usize];
        segment.read_stream(segment.meta.index_offset, &mut buf)?;
        if crc32fast::hash(&buf) != segment.meta.index_crc {
            return Err(Error::Corruption(format!(
                "segment {} index checksum mismatch",
                segment.meta.id
            )));
        }
        let index: SegmentIndex = bincode::deserialize(&buf)
            .map_err(|e| Error::Corruption(format!("segment {} index: {}", segment.meta.id, e)))?;
        if index.magic != magic::SEGMENT || !segment_version().can_read(index.version) {
            return Err(Error::Corruption(format!(
                "segment {} has an unknown format",
                segment.meta.id
            )));
        }

        segment.index = index.chunks;
        segment.last_key = index.last_key;
        Ok(segment)
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Logical size in bytes
    pub fn data_len(&self) -> u64 {
        self.meta.data_len
    }

    pub fn entry_count(&self) -> u64 {
        self.meta.entry_count
    }

    fn read_stream(&self, mut logical: u64, buf: &mut [u8]) -> Result<()> {
        if logical + buf.len() as u64 > self.meta.data_len {
            return Err(Error::Corruption(format!(
                "segment {} read past its end",
                self.meta.id
            )));
        }
        let mut filled = 0;
        while filled < buf.len() {
            let (offset, room) = block_position(&self.file, &self.blocks, logical)?;
            let n = (room as usize).min(buf.len() - filled);
            self.file.read_pages(offset, &mut buf[filled..filled + n])?;
            logical += n as u64;
            filled += n;
        }
        Ok(())
    }

    /// Read a data chunk by index
    fn read_chunk(&self, chunk_idx: usize) -> Result<Vec<SegmentEntry>> {
        let index_entry = &self.index[chunk_idx];
        let mut buf = vec![0u8; index_entry.size as usize];
        self.read_stream(index_entry.offset, &mut buf)?;

        if buf.len() < 4 {
            return Err(Error::Corruption("segment chunk too small".into()));
        }
        let (data, crc_buf) = buf.split_at(buf.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_buf[0], crc_buf[1], crc_buf[2], crc_buf[3]]);
        if stored_crc != crc32fast::hash(data) {
            return Err(Error::Corruption(format!(
                "segment {} chunk {} CRC mismatch",
                self.meta.id, chunk_idx
            )));
        }

        let mut entries = Vec::new();
        let mut offset = 0;
        while offset + 4 <= data.len() {
            let len = u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            offset += 4;
            if offset + len > data.len() {
                return Err(Error::Corruption("segment entry overruns its chunk".into()));
            }
            let entry: SegmentEntry = bincode::deserialize(&data[offset..offset + len])
                .map_err(|e| Error::Corruption(format!("segment entry: {}", e)))?;
            entries.push(entry);
            offset += len;
        }
        Ok(entries)
    }

    /// Point lookup. Tombstones are returned as such.
    pub fn get(&self, key: &[u8]) -> Result<Option<MemtableEntry>> {
        if self.index.is_empty() || key > self.last_key.as_slice() {
            return Ok(None);
        }
        let chunk_idx = self
            .index
            .partition_point(|entry| entry.first_key.as_slice() <= key);
        if chunk_idx == 0 {
            return Ok(None);
        }
        let chunk = self.read_chunk(chunk_idx - 1)?;
        Ok(chunk
            .binary_search_by(|e| e.key.as_slice().cmp(key))
            .ok()
            .map(|i| chunk[i].clone().into_parts().1))
    }

    /// Iterate over every entry in key order
    pub fn iter(self: &Arc<Self>) -> SegmentIter {
        SegmentIter {
            segment: Arc::clone(self),
            chunk_idx: 0,
            entries: Vec::new().into_iter(),
        }
    }
}

/// Forward scan over a segment, one chunk in memory at a time
pub struct SegmentIter {
    segment: Arc<Segment>,
    chunk_idx: usize,
    entries: std::vec::IntoIter<SegmentEntry>,
}

impl SegmentIter {
    /// Get the next entry
    pub fn next_entry(&mut self) -> Result<Option<SegmentEntry>> {
        loop {
            if let Some(entry) = self.entries.next() {
                return Ok(Some(entry));
            }
            if self.chunk_idx >= self.segment.index.len() {
                return Ok(None);
            }
            self.entries = self.segment.read_chunk(self.chunk_idx)?.into_iter();
            self.chunk_idx += 1;
        }
    }
}

/// Positioned reads over a segment for the merged view. Keeps the last
/// chunk it loaded so walking neighbouring keys stays within one read.
pub struct SegmentCursor {
    segment: Arc<Segment>,
    cached: Option<(usize, Vec<SegmentEntry>)>,
}

impl SegmentCursor {
    pub fn new(segment: Arc<Segment>) -> Self {
        Self {
            segment,
            cached: None,
        }
    }

    fn chunk(&mut self, chunk_idx: usize) -> Result<&[SegmentEntry]> {
        let hit = matches!(&self.cached, Some((idx, _)) if *idx == chunk_idx);
        if !hit {
            let entries = self.segment.read_chunk(chunk_idx)?;
            self.cached = Some((chunk_idx, entries));
        }
        Ok(match &self.cached {
            Some((_, entries)) => entries.as_slice(),
            None => &[],
        })
    }

    /// First entry of chunk `chunk_idx` satisfying `pred`, falling through
    /// to the following chunk.
    fn forward(
        &mut self,
        chunk_idx: usize,
        pred: impl Fn(&[u8]) -> bool,
    ) -> Result<Option<SegmentEntry>> {
        let chunks = self.segment.index.len();
        for idx in chunk_idx..chunks.min(chunk_idx + 2) {
            if let Some(entry) = self.chunk(idx)?.iter().find(|e| pred(&e.key)) {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    fn backward(
        &mut self,
        chunk_idx: usize,
        pred: impl Fn(&[u8]) -> bool,
    ) -> Result<Option<SegmentEntry>> {
        Ok(self
            .chunk(chunk_idx)?
            .iter()
            .rev()
            .find(|e| pred(&e.key))
            .cloned())
    }
}

impl SortedSource for SegmentCursor {
    fn seek(&mut self, seek: Seek<'_>) -> Result<Option<(Vec<u8>, MemtableEntry)>> {
        let segment = Arc::clone(&self.segment);
        let chunks = segment.index.len();
        if chunks == 0 {
            return Ok(None);
        }
        let last_key = segment.last_key.as_slice();
        let chunk_of = |key: &[u8], inclusive: bool| {
            segment.index.partition_point(|e| {
                if inclusive {
                    e.first_key.as_slice() <= key
                } else {
                    e.first_key.as_slice() < key
                }
            })
        };

        let found = match seek {
            Seek::First => self.forward(0, |_| true)?,
            Seek::Last => self.backward(chunks - 1, |_| true)?,
            Seek::Ge(key) if key <= last_key => {
                let idx = chunk_of(key, true).saturating_sub(1);
                self.forward(idx, |k| k >= key)?
            }
            Seek::Gt(key) if key < last_key => {
                let idx = chunk_of(key, true).saturating_sub(1);
                self.forward(idx, |k| k > key)?
            }
            Seek::Le(key) => match chunk_of(key, true) {
                0 => None,
                idx => self.backward(idx - 1, |k| k <= key)?,
            },
            Seek::Lt(key) => match chunk_of(key, false) {
                0 => None,
                idx => self.backward(idx - 1, |k| k < key)?,
            },
            Seek::Ge(_) | Seek::Gt(_) => None,
        };
        Ok(found.map(SegmentEntry::into_parts))
    }
}
