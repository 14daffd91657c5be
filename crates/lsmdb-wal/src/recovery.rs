// WAL recovery module - handles crash recovery logic
//
// Recovery is responsible for:
// 1. Reading every frame from the checkpointed position forward
// 2. Grouping BEGIN/COMMIT delimited records into atomic batches
// 3. Dropping a trailing group that never committed
// 4. Working out where the writer should resume

use crate::chain::WalPosition;
use crate::record::{RecordPayload, WalRecord};
use crate::WalReader;
use lsmdb_core::{BlockId, DbFile, Result};
use tracing::{debug, warn};

/// Manages WAL recovery after crash or restart
pub struct RecoveryManager<'a> {
    file: &'a DbFile,
    start: WalPosition,
    min_lsn: u64,
}

/// What recovery found in the log.
#[derive(Debug, Clone)]
pub struct RecoveredLog {
    /// Committed data records, one batch per commit, in commit order
    pub batches: Vec<Vec<WalRecord>>,
    /// Position just past the last committed frame
    pub end: WalPosition,
    /// Chain blocks from the start through `end.block`
    pub blocks: Vec<BlockId>,
    /// LSN for the next frame written
    pub next_lsn: u64,
    pub stats: RecoveryStats,
}

impl<'a> RecoveryManager<'a> {
    /// Recovery over the chain starting at `start`, where `min_lsn` is the
    /// first LSN not covered by the last checkpoint.
    pub fn new(file: &'a DbFile, start: WalPosition, min_lsn: u64) -> Self {
        Self {
            file,
            start,
            min_lsn,
        }
    }

    /// Reads the log and returns committed batches in the order they were
    /// committed.
    pub fn recover(&self) -> Result<RecoveredLog> {
        let mut reader = WalReader::new(self.file, self.start, self.min_lsn)?;
        let mut stats = RecoveryStats::default();
        let mut batches = Vec::new();
        let mut group: Option<(u64, Vec<WalRecord>)> = None;
        let mut max_lsn = None;
        let mut end = self.start;
        let mut end_blocks = 1;

        while let Some(record) = reader.next_record()? {
            stats.total_records += 1;
            max_lsn = Some(record.lsn);

            match &record.payload {
                RecordPayload::Put { .. } | RecordPayload::Delete { .. } => {
                    if matches!(record.payload, RecordPayload::Put { .. }) {
                        stats.put_records += 1;
                    } else {
                        stats.delete_records += 1;
                    }
                    match group.as_mut() {
                        Some((_, records)) => records.push(record),
                        None => {
                            batches.push(vec![record]);
                            end = reader.position();
                            end_blocks = reader.blocks().len();
                        }
                    }
                }
                RecordPayload::BeginTx { tx_id } => {
                    stats.transactions_started += 1;
                    if group.is_some() {
                        break;
                    }
                    group = Some((*tx_id, Vec::new()));
                }
                RecordPayload::CommitTx { tx_id } => match group.take() {
                    Some((open, records)) if open == *tx_id => {
                        stats.transactions_committed += 1;
                        if !records.is_empty() {
                            batches.push(records);
                        }
                        end = reader.position();
                        end_blocks = reader.blocks().len();
                    }
                    _ => {
                        group = None;
                        stats.transactions_incomplete += 1;
                        break;
                    }
                },
            }
        }

        if let Some((tx_id, records)) = group {
            stats.transactions_incomplete += 1;
            warn!(tx_id, records = records.len(), "Dropping uncommitted WAL group");
        }

        let blocks = reader.blocks()[..end_blocks].to_vec();
        stats.blocks = blocks.len();
        let next_lsn = max_lsn.map_or(self.min_lsn, |lsn| (lsn + 1).max(self.min_lsn));

        debug!(
            records = stats.total_records,
            batches = batches.len(),
            next_lsn,
            "WAL recovery complete"
        );

        Ok(RecoveredLog {
            batches,
            end,
            blocks,
            next_lsn,
            stats,
        })
    }
}

/// Statistics about the WAL state
#[derive(Debug, Clone, Default)]
pub struct RecoveryStats {
    /// Number of chain blocks kept
    pub blocks: usize,
    /// Total number of valid frames read
    pub total_records: usize,
    /// Number of PUT records
    pub put_records: usize,
    /// Number of DELETE records
    pub delete_records: usize,
    /// Number of transactions started
    pub transactions_started: usize,
    /// Number of transactions committed
    pub transactions_committed: usize,
    /// Number of incomplete transactions (started but not committed)
    pub transactions_incomplete: usize,
}
