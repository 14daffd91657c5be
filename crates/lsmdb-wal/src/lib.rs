//! # lsmdb WAL (Write-Ahead Log)
//!
//! Write-ahead log for lsmdb. The log is a chain of blocks inside the
//! database file; every depth-0 commit is appended here before it reaches
//! the memory buffer, and replayed from the last checkpoint after a crash.
//!
//! **This crate is an internal implementation detail of lsmdb.** Depend on
//! the `lsmdb` crate instead.

use lsmdb_core::{BlockAllocator, BlockId, DbFile, Result, Safety};
use std::sync::{Arc, Mutex};

pub mod chain;
pub mod reader;
pub mod record;
pub mod recovery;
pub mod writer;

pub use chain::WalPosition;
pub use reader::WalReader;
pub use record::{RecordPayload, RecordType, WalRecord};
pub use recovery::{RecoveredLog, RecoveryManager, RecoveryStats};
pub use writer::WalWriter;

/// WAL configuration options
#[derive(Debug, Clone, Copy)]
pub struct WalConfig {
    /// When appended frames are forced to disk
    pub safety: Safety,
    /// Whether commits are logged at all
    pub enabled: bool,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            safety: Safety::Normal,
            enabled: true,
        }
    }
}

/// WAL manager coordinates log writing, syncing and truncation
pub struct WalManager {
    config: WalConfig,
    writer: WalWriter,
    next_tx_id: u64,
}

impl WalManager {
    /// Starts a log for a new database.
    pub fn create(
        file: Arc<DbFile>,
        alloc: Arc<Mutex<BlockAllocator>>,
        config: WalConfig,
    ) -> Result<Self> {
        let writer = WalWriter::create(file, alloc, 1)?;
        Ok(Self {
            config,
            writer,
            next_tx_id: 1,
        })
    }

    /// Reopens the log where recovery left off.
    pub fn resume(
        file: Arc<DbFile>,
        alloc: Arc<Mutex<BlockAllocator>>,
        config: WalConfig,
        log: &RecoveredLog,
    ) -> Result<Self> {
        let writer = WalWriter::resume(file, alloc, log.end, log.blocks.clone(), log.next_lsn)?;
        Ok(Self {
            config,
            writer,
            next_tx_id: log.next_lsn,
        })
    }

    /// Logs one commit. A single record is written on its own; several are
    /// wrapped in BEGIN/COMMIT so recovery applies all or none of them.
    ///
    /// Returns the encoded size, which is counted even when logging is off.
    pub fn log_commit(&mut self, records: Vec<WalRecord>) -> Result<u64> {
        let framed = if records.len() > 1 {
            let tx_id = self.next_tx_id;
            self.next_tx_id += 1;
            let mut framed = Vec::with_capacity(records.len() + 2);
            framed.push(WalRecord::begin_tx(tx_id));
            framed.extend(records);
            framed.push(WalRecord::commit_tx(tx_id));
            framed
        } else {
            records
        };

        if !self.config.enabled {
            let mut size = 0;
            for record in &framed {
                size += record.encode()?.len() as u64;
            }
            return Ok(size);
        }

        let size = self.writer.append(framed)?;
        if self.config.safety == Safety::Full {
            self.writer.sync()?;
        }
        Ok(size)
    }

    /// Sync the WAL to disk unless safety is off.
    pub fn sync(&self) -> Result<()> {
        if self.config.safety == Safety::Off {
            return Ok(());
        }
        self.writer.sync()
    }

    /// Position the next frame will be written at.
    pub fn position(&self) -> WalPosition {
        self.writer.position()
    }

    /// LSN the next frame will carry.
    pub fn next_lsn(&self) -> u64 {
        self.writer.next_lsn()
    }

    /// Releases the chain before a checkpointed position.
    pub fn truncate_before(&mut self, start: WalPosition) -> Vec<BlockId> {
        self.writer.truncate_before(start)
    }

    /// Blocks the chain currently occupies.
    pub fn blocks(&self) -> Vec<BlockId> {
        self.writer.blocks().copied().collect()
    }

    pub fn set_safety(&mut self, safety: Safety) {
        self.config.safety = safety;
    }

    /// Get the current configuration
    pub fn config(&self) -> &WalConfig {
        &self.config
    }
}
