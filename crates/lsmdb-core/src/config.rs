//! Database configuration.
//!
//! Page and block size are fixed when the file is created; the remaining
//! fields may be changed on an open handle.

use crate::error::{Error, Result};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Default block size in KB.
pub const DEFAULT_BLOCK_SIZE_KB: u32 = 1024;

/// Smallest accepted page size in bytes.
pub const MIN_PAGE_SIZE: u32 = 512;

/// Largest accepted page size in bytes.
pub const MAX_PAGE_SIZE: u32 = 64 * 1024;

/// Smallest accepted block size in KB. Block 0 holds both header slots.
pub const MIN_BLOCK_SIZE_KB: u32 = 64;

/// Largest accepted block size in KB.
pub const MAX_BLOCK_SIZE_KB: u32 = 64 * 1024;

/// When the engine forces data to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Safety {
    /// Never sync. A crash may lose any write since the last clean close.
    Off,
    /// Sync at checkpoint boundaries.
    #[default]
    Normal,
    /// Sync the log on every commit.
    Full,
}

impl Safety {
    /// Numeric level matching `LSM_SAFETY_*`.
    pub fn level(self) -> u8 {
        match self {
            Safety::Off => 0,
            Safety::Normal => 1,
            Safety::Full => 2,
        }
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Page size in bytes (power of two, 512..=65536)
    pub page_size: u32,
    /// Block size in KB (power of two, 64..=65536)
    pub block_size_kb: u32,
    /// Write safety level
    pub safety: Safety,
    /// Flush the memory buffer to a segment once it holds this many KB
    pub autoflush_kb: u64,
    /// Checkpoint once this many KB were logged since the last one (0 = manual only)
    pub autocheckpoint_kb: u64,
    /// Merge when more than this many segments exist (1 = never merge)
    pub automerge: usize,
    /// Run flushes, merges and checkpoints automatically after writes
    pub autowork: bool,
    /// Serve segment reads from a memory map
    pub mmap: bool,
    /// Take an advisory lock on the file so other processes can share it safely
    pub multiple_processes: bool,
    /// Log commits to the write-ahead log
    pub transaction_log: bool,
    /// Open without write access
    pub readonly: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            block_size_kb: DEFAULT_BLOCK_SIZE_KB,
            safety: Safety::Normal,
            autoflush_kb: 1024,
            autocheckpoint_kb: 2048,
            automerge: 4,
            autowork: true,
            mmap: true,
            multiple_processes: true,
            transaction_log: true,
            readonly: false,
        }
    }
}

impl Config {
    /// Block size in bytes.
    pub fn block_bytes(&self) -> u64 {
        u64::from(self.block_size_kb) * 1024
    }

    /// Checks the fields that have fixed ranges.
    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)?;
        validate_block_size(self.block_size_kb)?;
        if self.block_bytes() < u64::from(self.page_size) * 4 {
            return Err(Error::Config(format!(
                "block size {} KB must hold at least 4 pages of {} bytes",
                self.block_size_kb, self.page_size
            )));
        }
        if self.automerge == 0 {
            return Err(Error::Config("automerge must be at least 1".into()));
        }
        if self.autoflush_kb == 0 {
            return Err(Error::Config("autoflush must be at least 1 KB".into()));
        }
        Ok(())
    }
}

/// Validates a page size in bytes.
pub fn validate_page_size(page_size: u32) -> Result<()> {
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::Config(format!(
            "page size {} must be a power of two between {} and {}",
            page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

/// Validates a block size in KB.
pub fn validate_block_size(block_size_kb: u32) -> Result<()> {
    if !block_size_kb.is_power_of_two()
        || !(MIN_BLOCK_SIZE_KB..=MAX_BLOCK_SIZE_KB).contains(&block_size_kb)
    {
        return Err(Error::Config(format!(
            "block size {} KB must be a power of two between {} and {}",
            block_size_kb, MIN_BLOCK_SIZE_KB, MAX_BLOCK_SIZE_KB
        )));
    }
    Ok(())
}
