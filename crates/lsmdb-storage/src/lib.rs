//! # lsmdb Storage Engine
//!
//! LSM-tree storage for lsmdb.
//!
//! **This crate is an internal implementation detail of lsmdb.** Depend on
//! the `lsmdb` crate instead; this API may change without notice.
//!
//! The whole database lives in one file:
//!
//! - **Memtable**: in-memory write buffer using BTreeMap for sorted order
//! - **Segment**: immutable sorted runs stored in file blocks
//! - **Merge**: folds neighbouring segments to bound read fan-out
//! - **Checkpoint**: dual header slots recording the live segments and
//!   where log replay starts
//!
//! ## Architecture
//!
//! ```text
//! Writes → WAL → Memtable (memory) → Segment (file blocks)
//!                    ↓                     ↓
//!            Flush when full        Merge when too many
//! ```
//!
//! Lock order inside the engine is `work → wal → version → allocator`.
//! `work` serializes flushes, merges and checkpoints; `version` is only
//! held to swap in-memory state, never across segment I/O.

use lsmdb_core::{BlockAllocator, Config, DbFile, Error, Result, Safety};
use lsmdb_wal::{RecordPayload, RecoveryManager, WalConfig, WalManager, WalPosition, WalRecord};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

pub mod checkpoint;
pub mod memtable;
pub mod merge;
pub mod segment;
pub mod view;

pub use checkpoint::{CheckpointHeader, Geometry};
pub use memtable::{Memtable, MemtableEntry};
pub use merge::MergeStats;
pub use segment::{Segment, SegmentCursor, SegmentEntry, SegmentMeta, SegmentWriter};
pub use view::{MergedView, Seek, SortedSource};

/// In-memory state readers snapshot.
#[derive(Debug, Clone, Default)]
struct Version {
    /// Active memtable
    memtable: Memtable,
    /// Frozen memtables being flushed, newest first
    immutables: Vec<Memtable>,
    /// Live segments, newest first
    segments: Arc<Vec<Arc<Segment>>>,
}

/// State owned by whoever holds the work lock.
#[derive(Debug)]
struct WorkState {
    /// Slot holding the newest durable header
    slot: usize,
    checkpoint_id: u64,
    next_segment_id: u64,
    flushes: u64,
    checkpoints: u64,
    merge_stats: MergeStats,
}

/// Log position captured when the memtable was frozen.
#[derive(Debug, Clone, Copy)]
struct Freeze {
    position: WalPosition,
    lsn: u64,
    logged: u64,
}

/// A consistent view of the engine's layers at one instant.
///
/// Holding a snapshot pins its segments: a merge that retires them leaves
/// their blocks alone until every snapshot is gone.
#[derive(Debug, Clone)]
pub struct Snapshot {
    memtable: Memtable,
    immutables: Vec<Memtable>,
    segments: Arc<Vec<Arc<Segment>>>,
}

impl Snapshot {
    /// The layers as sorted sources, highest priority first.
    pub fn into_sources(self) -> Vec<Box<dyn SortedSource>> {
        let mut sources: Vec<Box<dyn SortedSource>> =
            Vec::with_capacity(1 + self.immutables.len() + self.segments.len());
        sources.push(Box::new(self.memtable));
        for mt in self.immutables {
            sources.push(Box::new(mt));
        }
        for segment in self.segments.iter() {
            sources.push(Box::new(SegmentCursor::new(Arc::clone(segment))));
        }
        sources
    }
}

/// Storage engine manager
///
/// Provides persistent key-value storage using an LSM-tree kept in a
/// single file.
pub struct StorageEngine {
    file: Arc<DbFile>,
    alloc: Arc<Mutex<BlockAllocator>>,
    geometry: Geometry,
    settings: RwLock<Config>,
    work: Mutex<WorkState>,
    wal: Mutex<WalManager>,
    version: RwLock<Version>,
    /// Segments replaced by a merge, waiting for readers to let go
    retired: Mutex<Vec<Arc<Segment>>>,
    checkpoint_size: AtomicU64,
    closed: AtomicBool,
}

impl StorageEngine {
    /// Open or create a database file at the given path
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        let mut file = DbFile::open(path, &config)?;
        let wal_config = WalConfig {
            safety: config.safety,
            enabled: config.transaction_log,
        };

        if file.is_empty()? {
            if config.readonly {
                return Err(Error::Misuse(
                    "cannot create a database in readonly mode".into(),
                ));
            }
            return Self::create(file, config, wal_config);
        }

        let loaded = checkpoint::read_header(&file)?;
        let geometry = loaded.geometry;
        let geometry_ok = lsmdb_core::config::validate_page_size(geometry.page_size).is_ok()
            && lsmdb_core::config::validate_block_size(geometry.block_size_kb).is_ok();
        if !geometry_ok {
            return Err(Error::Corruption(format!(
                "header records invalid geometry: {} byte pages, {} KB blocks",
                geometry.page_size, geometry.block_size_kb
            )));
        }
        file.adopt_geometry(geometry.page_size, u64::from(geometry.block_size_kb) * 1024);
        let file = Arc::new(file);
        let header = loaded.header;

        let mut segments = Vec::with_capacity(header.segments.len());
        for meta in header.segments.iter().cloned() {
            segments.push(Arc::new(Segment::open(Arc::clone(&file), meta)?));
        }

        let log = RecoveryManager::new(&file, header.wal_start, header.wal_lsn).recover()?;
        let used = segments
            .iter()
            .flat_map(|s| s.blocks().iter().copied())
            .chain(log.blocks.iter().copied())
            .collect::<Vec<_>>();
        let alloc = Arc::new(Mutex::new(BlockAllocator::rebuild(
            file.block_count()?,
            used,
        )));
        let wal = WalManager::resume(Arc::clone(&file), Arc::clone(&alloc), wal_config, &log)?;

        let mut memtable = Memtable::new();
        let mut replayed = 0u64;
        for batch in log.batches {
            for record in batch {
                replayed += record.encode()?.len() as u64;
                match record.payload {
                    RecordPayload::Put { key, value } => memtable.put(key, value),
                    RecordPayload::Delete { key } => memtable.delete(key),
                    RecordPayload::BeginTx { .. } | RecordPayload::CommitTx { .. } => {}
                }
            }
        }

        info!(
            path = %file.path().display(),
            segments = segments.len(),
            replayed_entries = memtable.len(),
            checkpoint_id = header.checkpoint_id,
            "Opened database"
        );

        let settings = Config {
            page_size: geometry.page_size,
            block_size_kb: geometry.block_size_kb,
            ..config
        };
        Ok(Self {
            file,
            alloc,
            geometry,
            settings: RwLock::new(settings),
            work: Mutex::new(WorkState {
                slot: loaded.slot,
                checkpoint_id: header.checkpoint_id,
                next_segment_id: header.next_segment_id,
                flushes: 0,
                checkpoints: 0,
                merge_stats: MergeStats::default(),
            }),
            wal: Mutex::new(wal),
            version: RwLock::new(Version {
                memtable,
                immutables: Vec::new(),
                segments: Arc::new(segments),
            }),
            retired: Mutex::new(Vec::new()),
            checkpoint_size: AtomicU64::new(replayed),
            closed: AtomicBool::new(false),
        })
    }

    fn create(file: DbFile, config: Config, wal_config: WalConfig) -> Result<Self> {
        let geometry = Geometry {
            page_size: config.page_size,
            block_size_kb: config.block_size_kb,
        };
        let file = Arc::new(file);
        let alloc = Arc::new(Mutex::new(BlockAllocator::new()));
        let wal = WalManager::create(Arc::clone(&file), Arc::clone(&alloc), wal_config)?;

        let header = CheckpointHeader {
            checkpoint_id: 1,
            segments: Vec::new(),
            wal_start: wal.position(),
            wal_lsn: wal.next_lsn(),
            next_segment_id: 1,
        };
        checkpoint::write_header(&file, 0, geometry, &header)?;
        if config.safety != Safety::Off {
            file.sync()?;
        }

        info!(
            path = %file.path().display(),
            page_size = geometry.page_size,
            block_kb = geometry.block_size_kb,
            "Created database"
        );

        Ok(Self {
            file,
            alloc,
            geometry,
            settings: RwLock::new(config),
            work: Mutex::new(WorkState {
                slot: 0,
                checkpoint_id: 1,
                next_segment_id: 1,
                flushes: 0,
                checkpoints: 0,
                merge_stats: MergeStats::default(),
            }),
            wal: Mutex::new(wal),
            version: RwLock::new(Version::default()),
            retired: Mutex::new(Vec::new()),
            checkpoint_size: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn check_writable(&self) -> Result<()> {
        if self.file.is_readonly() {
            return Err(Error::Misuse("database was opened readonly".into()));
        }
        Ok(())
    }

    /// Current settings
    pub fn config(&self) -> Result<Config> {
        Ok(self.settings.read().map_err(|_| Error::LockPoisoned)?.clone())
    }

    fn update_settings(&self, f: impl FnOnce(&mut Config)) -> Result<()> {
        let mut settings = self.settings.write().map_err(|_| Error::LockPoisoned)?;
        f(&mut settings);
        Ok(())
    }

    /// Page size the file was created with
    pub fn page_size(&self) -> u32 {
        self.geometry.page_size
    }

    /// Block size in KB the file was created with
    pub fn block_size_kb(&self) -> u32 {
        self.geometry.block_size_kb
    }

    pub fn is_readonly(&self) -> bool {
        self.file.is_readonly()
    }

    /// Insert or update a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(vec![(key.to_vec(), MemtableEntry::Value(value.to_vec()))])
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write(vec![(key.to_vec(), MemtableEntry::Tombstone)])
    }

    /// Applies `batch` atomically, then runs any flush, checkpoint or merge
    /// it makes due.
    pub fn write(&self, batch: Vec<(Vec<u8>, MemtableEntry)>) -> Result<()> {
        if self.write_logged(batch)? {
            self.maybe_autowork()?;
        }
        Ok(())
    }

    /// Logs `batch` as one commit and makes it visible in the memtable as a
    /// whole. No background work runs, so callers holding their own locks
    /// can release them before calling [`maybe_autowork`](Self::maybe_autowork).
    ///
    /// Returns `false` for an empty batch.
    pub fn write_logged(&self, batch: Vec<(Vec<u8>, MemtableEntry)>) -> Result<bool> {
        if batch.is_empty() {
            return Ok(false);
        }
        self.check_writable()?;

        let records = batch
            .iter()
            .map(|(key, entry)| match entry {
                MemtableEntry::Value(value) => WalRecord::put(key.clone(), value.clone()),
                MemtableEntry::Tombstone => WalRecord::delete(key.clone()),
            })
            .collect();

        {
            let mut wal = self.wal.lock().map_err(|_| Error::LockPoisoned)?;
            let logged = wal.log_commit(records)?;
            let mut version = self.version.write().map_err(|_| Error::LockPoisoned)?;
            for (key, entry) in batch {
                version.memtable.insert(key, entry);
            }
            self.checkpoint_size.fetch_add(logged, Ordering::Relaxed);
        }
        Ok(true)
    }

    /// Flushes, checkpoints and merges as the thresholds require, if
    /// `autowork` is on.
    pub fn maybe_autowork(&self) -> Result<()> {
        if self.config()?.autowork {
            self.autowork()?;
        }
        Ok(())
    }

    /// Retrieve a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let segments = {
            let version = self.version.read().map_err(|_| Error::LockPoisoned)?;
            let buffered = std::iter::once(&version.memtable)
                .chain(version.immutables.iter())
                .find_map(|mt| mt.entry(key));
            if let Some(entry) = buffered {
                return Ok(entry.value().map(<[u8]>::to_vec));
            }
            Arc::clone(&version.segments)
        };

        for segment in segments.iter() {
            if let Some(entry) = segment.get(key)? {
                return Ok(entry.value().map(<[u8]>::to_vec));
            }
        }
        Ok(None)
    }

    /// Captures the current layers for a cursor.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let version = self.version.read().map_err(|_| Error::LockPoisoned)?;
        Ok(Snapshot {
            memtable: version.memtable.snapshot(),
            immutables: version.immutables.clone(),
            segments: Arc::clone(&version.segments),
        })
    }

    fn autowork(&self) -> Result<()> {
        let config = self.config()?;
        let buffered = self
            .version
            .read()
            .map_err(|_| Error::LockPoisoned)?
            .memtable
            .size_bytes();
        if buffered >= config.autoflush_kb * 1024 {
            self.flush()?;
        }
        if config.autocheckpoint_kb > 0
            && self.checkpoint_size() >= config.autocheckpoint_kb * 1024
        {
            self.checkpoint()?;
        }
        if config.automerge > 1 {
            let mut work = self.work.lock().map_err(|_| Error::LockPoisoned)?;
            while self.merge_once(&mut work, config.automerge)? {}
            self.release_retired()?;
        }
        Ok(())
    }

    /// Moves the active memtable to the frozen list. Must be called with the
    /// work lock held.
    fn freeze(&self) -> Result<Freeze> {
        let wal = self.wal.lock().map_err(|_| Error::LockPoisoned)?;
        let mut version = self.version.write().map_err(|_| Error::LockPoisoned)?;
        if !version.memtable.is_empty() {
            let frozen = std::mem::take(&mut version.memtable);
            version.immutables.insert(0, frozen);
        }
        Ok(Freeze {
            position: wal.position(),
            lsn: wal.next_lsn(),
            logged: self.checkpoint_size.load(Ordering::Relaxed),
        })
    }

    /// Writes every frozen memtable out as a segment, oldest first. Each
    /// segment is published before its memtable is dropped, so readers see
    /// the data throughout.
    fn flush_immutables(&self, work: &mut WorkState) -> Result<()> {
        loop {
            let oldest = {
                let version = self.version.read().map_err(|_| Error::LockPoisoned)?;
                match version.immutables.last() {
                    Some(mt) => mt.snapshot(),
                    None => return Ok(()),
                }
            };

            let id = work.next_segment_id;
            work.next_segment_id += 1;
            let entries = oldest.len();
            let mut writer =
                SegmentWriter::new(Arc::clone(&self.file), Arc::clone(&self.alloc), id);
            for (key, entry) in oldest.into_entries() {
                if let Err(e) = writer.add(SegmentEntry::new(key, entry)) {
                    writer.abandon()?;
                    return Err(e);
                }
            }
            let meta = writer.finish()?;
            let segment = Arc::new(Segment::open(Arc::clone(&self.file), meta)?);

            {
                let mut version = self.version.write().map_err(|_| Error::LockPoisoned)?;
                let mut segments = Vec::with_capacity(version.segments.len() + 1);
                segments.push(segment);
                segments.extend(version.segments.iter().cloned());
                version.segments = Arc::new(segments);
                version.immutables.pop();
            }

            work.flushes += 1;
            debug!(segment = id, entries, "Flushed memtable to segment");
        }
    }

    /// Flushes the memtable to a new segment.
    ///
    /// Returns `false` if there was nothing to flush.
    pub fn flush(&self) -> Result<bool> {
        self.check_writable()?;
        let mut work = self.work.lock().map_err(|_| Error::LockPoisoned)?;
        let had_data = !self
            .version
            .read()
            .map_err(|_| Error::LockPoisoned)?
            .memtable
            .is_empty();
        self.freeze()?;
        self.flush_immutables(&mut work)?;
        self.release_retired()?;
        Ok(had_data)
    }

    /// Makes everything committed so far durable in segments, writes a new
    /// header and truncates the log.
    pub fn checkpoint(&self) -> Result<()> {
        self.check_writable()?;
        let mut work = self.work.lock().map_err(|_| Error::LockPoisoned)?;
        self.checkpoint_locked(&mut work)
    }

    fn checkpoint_locked(&self, work: &mut WorkState) -> Result<()> {
        let freeze = self.freeze()?;
        self.flush_immutables(work)?;

        let safety = self.config()?.safety;
        if safety != Safety::Off {
            self.file.sync()?;
        }

        let segments = Arc::clone(&self.version.read().map_err(|_| Error::LockPoisoned)?.segments);
        let header = CheckpointHeader {
            checkpoint_id: work.checkpoint_id + 1,
            segments: segments.iter().map(|s| s.meta().clone()).collect(),
            wal_start: freeze.position,
            wal_lsn: freeze.lsn,
            next_segment_id: work.next_segment_id,
        };
        drop(segments);

        let pending = self
            .alloc
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .take_pending();
        let slot = 1 - work.slot;
        let written = checkpoint::write_header(&self.file, slot, self.geometry, &header)
            .and_then(|()| {
                if safety != Safety::Off {
                    self.file.sync()?;
                }
                Ok(())
            });
        if let Err(e) = written {
            // The old header is still the durable one.
            self.alloc
                .lock()
                .map_err(|_| Error::LockPoisoned)?
                .release(pending);
            return Err(e);
        }

        work.slot = slot;
        work.checkpoint_id = header.checkpoint_id;
        work.checkpoints += 1;

        let truncated = self
            .wal
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .truncate_before(freeze.position);
        {
            let mut alloc = self.alloc.lock().map_err(|_| Error::LockPoisoned)?;
            alloc.reclaim(pending);
            alloc.reclaim(truncated);
        }
        self.checkpoint_size
            .fetch_sub(freeze.logged, Ordering::Relaxed);
        self.release_retired()?;

        info!(
            checkpoint_id = header.checkpoint_id,
            segments = header.segments.len(),
            wal_lsn = header.wal_lsn,
            "Checkpoint complete"
        );
        Ok(())
    }

    /// Runs one merge if the segment count exceeds `automerge`.
    fn merge_once(&self, work: &mut WorkState, automerge: usize) -> Result<bool> {
        let segments = Arc::clone(&self.version.read().map_err(|_| Error::LockPoisoned)?.segments);
        let Some(window) = merge::pick_window(&segments, automerge) else {
            return Ok(false);
        };
        let inputs: Vec<Arc<Segment>> = segments[window.clone()].to_vec();
        let includes_oldest = window.end == segments.len();
        drop(segments);

        let id = work.next_segment_id;
        work.next_segment_id += 1;
        let writer = SegmentWriter::new(Arc::clone(&self.file), Arc::clone(&self.alloc), id);
        let merged = match merge::merge_segments(
            &inputs,
            writer,
            includes_oldest,
            &mut work.merge_stats,
        )? {
            Some(meta) => {
                if self.config()?.safety != Safety::Off {
                    self.file.sync()?;
                }
                Some(Arc::new(Segment::open(Arc::clone(&self.file), meta)?))
            }
            None => None,
        };

        {
            let mut version = self.version.write().map_err(|_| Error::LockPoisoned)?;
            let mut segments = Vec::with_capacity(version.segments.len());
            segments.extend(version.segments[..window.start].iter().cloned());
            segments.extend(merged);
            segments.extend(version.segments[window.end..].iter().cloned());
            version.segments = Arc::new(segments);
        }

        debug!(
            output = id,
            inputs = inputs.len(),
            dropped_tombstones = includes_oldest,
            "Merged segments"
        );
        self.retired
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .extend(inputs);
        Ok(true)
    }

    /// Merges until no more than `automerge` segments remain, regardless
    /// of `autowork`. Returns the number of merges run.
    pub fn work(&self) -> Result<usize> {
        self.check_writable()?;
        let automerge = self.config()?.automerge;
        let mut work = self.work.lock().map_err(|_| Error::LockPoisoned)?;
        let mut merges = 0;
        while self.merge_once(&mut work, automerge)? {
            merges += 1;
        }
        self.release_retired()?;
        Ok(merges)
    }

    /// Hands the blocks of retired segments no reader still holds to the
    /// allocator. They become reusable after the next checkpoint.
    fn release_retired(&self) -> Result<()> {
        let mut freed = Vec::new();
        self.retired
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .retain(|segment| {
                if Arc::strong_count(segment) == 1 {
                    freed.extend_from_slice(segment.blocks());
                    false
                } else {
                    true
                }
            });
        if !freed.is_empty() {
            self.alloc
                .lock()
                .map_err(|_| Error::LockPoisoned)?
                .release(freed);
        }
        Ok(())
    }

    pub fn set_safety(&self, safety: Safety) -> Result<()> {
        self.update_settings(|c| c.safety = safety)?;
        let mut wal = self.wal.lock().map_err(|_| Error::LockPoisoned)?;
        let raised = safety > wal.config().safety;
        wal.set_safety(safety);
        // Commits logged under the weaker level are made durable now.
        if raised && !self.file.is_readonly() {
            wal.sync()?;
        }
        Ok(())
    }

    pub fn set_autoflush(&self, kb: u64) -> Result<()> {
        if kb == 0 {
            return Err(Error::Config("autoflush must be at least 1 KB".into()));
        }
        self.update_settings(|c| c.autoflush_kb = kb)
    }

    pub fn set_autocheckpoint(&self, kb: u64) -> Result<()> {
        self.update_settings(|c| c.autocheckpoint_kb = kb)
    }

    pub fn set_automerge(&self, segments: usize) -> Result<()> {
        if segments == 0 {
            return Err(Error::Config("automerge must be at least 1".into()));
        }
        self.update_settings(|c| c.automerge = segments)
    }

    pub fn set_autowork(&self, enabled: bool) -> Result<()> {
        self.update_settings(|c| c.autowork = enabled)
    }

    /// Segment pages written since open
    pub fn pages_written(&self) -> u64 {
        self.file.pages_written()
    }

    /// Segment pages read since open
    pub fn pages_read(&self) -> u64 {
        self.file.pages_read()
    }

    /// Bytes logged since the last checkpoint
    pub fn checkpoint_size(&self) -> u64 {
        self.checkpoint_size.load(Ordering::Relaxed)
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let work = self.work.lock().map_err(|_| Error::LockPoisoned)?;
        let wal_blocks = self
            .wal
            .lock()
            .map_err(|_| Error::LockPoisoned)?
            .blocks()
            .len();
        let version = self.version.read().map_err(|_| Error::LockPoisoned)?;
        let (free_blocks, pending_blocks, total_blocks) = {
            let alloc = self.alloc.lock().map_err(|_| Error::LockPoisoned)?;
            (alloc.free_count(), alloc.pending_count(), alloc.high_water())
        };

        Ok(StorageStats {
            memtable_size: version.memtable.size_bytes(),
            memtable_entries: version.memtable.len(),
            immutable_memtables: version.immutables.len(),
            segment_count: version.segments.len(),
            segment_entries: version.segments.iter().map(|s| s.entry_count()).sum(),
            segment_bytes: version.segments.iter().map(|s| s.data_len()).sum(),
            retired_segments: self.retired.lock().map_err(|_| Error::LockPoisoned)?.len(),
            wal_blocks,
            free_blocks,
            pending_blocks,
            total_blocks,
            pages_read: self.pages_read(),
            pages_written: self.pages_written(),
            checkpoint_size: self.checkpoint_size(),
            checkpoint_id: work.checkpoint_id,
            flushes: work.flushes,
            checkpoints: work.checkpoints,
            merge_stats: work.merge_stats.clone(),
        })
    }

    /// Checkpoints and releases the file lock. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if !self.file.is_readonly() {
            let checkpointed = self
                .work
                .lock()
                .map_err(|_| Error::LockPoisoned)
                .and_then(|mut work| self.checkpoint_locked(&mut work));
            if let Err(e) = checkpointed {
                // Still open and locked; a later close retries.
                self.closed.store(false, Ordering::Release);
                return Err(e);
            }
        }
        self.file.unlock()?;
        info!(path = %self.file.path().display(), "Closed database");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Current memtable size in bytes
    pub memtable_size: u64,
    /// Number of entries in memtable
    pub memtable_entries: usize,
    /// Frozen memtables not yet written out
    pub immutable_memtables: usize,
    /// Number of live segments
    pub segment_count: usize,
    /// Entries across live segments, shadowed versions included
    pub segment_entries: u64,
    /// Bytes across live segments
    pub segment_bytes: u64,
    /// Merged-away segments still pinned by readers
    pub retired_segments: usize,
    /// Blocks in the log chain
    pub wal_blocks: usize,
    pub free_blocks: usize,
    pub pending_blocks: usize,
    /// Blocks the file spans, header block included
    pub total_blocks: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub checkpoint_size: u64,
    pub checkpoint_id: u64,
    pub flushes: u64,
    pub checkpoints: u64,
    /// Merge statistics
    pub merge_stats: MergeStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn config() -> Config {
        Config {
            page_size: 512,
            block_size_kb: 64,
            multiple_processes: false,
            ..Config::default()
        }
    }

    fn open(dir: &TempDir, config: Config) -> StorageEngine {
        StorageEngine::open(dir.path().join("test.db"), config).unwrap()
    }

    fn all_keys(engine: &StorageEngine) -> Vec<Vec<u8>> {
        let mut view = MergedView::new(engine.snapshot().unwrap().into_sources());
        let mut keys = Vec::new();
        let mut cur = view.seek(Seek::First).unwrap();
        while let Some((key, _)) = cur {
            cur = view.seek(Seek::Gt(&key)).unwrap();
            keys.push(key);
        }
        keys
    }

    #[test]
    fn test_storage_engine_basic() {
        let dir = tempdir().unwrap();
        let engine = open(&dir, config());

        engine.put(b"key1", b"value1").unwrap();
        engine.put(b"key2", b"value2").unwrap();

        assert_eq!(engine.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(engine.get(b"key2").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(engine.get(b"key3").unwrap(), None);
    }

    #[test]
    fn test_write_logged_defers_autowork() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                autoflush_kb: 1,
                ..config()
            },
        );

        let value = vec![b'v'; 2048];
        assert!(engine
            .write_logged(vec![(b"big".to_vec(), MemtableEntry::Value(value))])
            .unwrap());
        assert!(!engine.write_logged(Vec::new()).unwrap());
        assert_eq!(engine.stats().unwrap().segment_count, 0);

        engine.maybe_autowork().unwrap();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.segment_count, 1);
        assert_eq!(stats.memtable_entries, 0);
    }

    #[test]
    fn test_raising_safety_reaches_the_log() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                safety: Safety::Off,
                ..config()
            },
        );
        engine.put(b"key", b"value").unwrap();

        engine.set_safety(Safety::Full).unwrap();
        assert_eq!(engine.wal.lock().unwrap().config().safety, Safety::Full);
        assert_eq!(engine.config().unwrap().safety, Safety::Full);

        engine.set_safety(Safety::Normal).unwrap();
        assert_eq!(engine.wal.lock().unwrap().config().safety, Safety::Normal);
    }

    #[test]
    fn test_failed_close_leaves_engine_open() {
        let dir = tempdir().unwrap();
        let engine = open(&dir, config());
        engine.put(b"key", b"value").unwrap();

        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _work = engine.work.lock().unwrap();
                    panic!("poison the work lock");
                })
                .join();
        });

        assert!(matches!(engine.close(), Err(Error::LockPoisoned)));
        assert!(!engine.is_closed());
        assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert!(engine.close().is_err());
    }

    #[test]
    fn test_storage_engine_delete() {
        let dir = tempdir().unwrap();
        let engine = open(&dir, config());

        engine.put(b"key", b"value").unwrap();
        engine.flush().unwrap();
        engine.delete(b"key").unwrap();
        assert_eq!(engine.get(b"key").unwrap(), None);
    }

    #[test]
    fn test_storage_engine_flush() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                autoflush_kb: 1,
                automerge: 1,
                ..config()
            },
        );

        for i in 0..100 {
            let key = format!("key{:03}", i);
            let value = format!("value{}", i);
            engine.put(key.as_bytes(), value.as_bytes()).unwrap();
        }

        let stats = engine.stats().unwrap();
        assert!(stats.segment_count >= 1);
        assert!(stats.flushes >= 1);
        assert!(stats.pages_written > 0);
        assert_eq!(engine.get(b"key000").unwrap(), Some(b"value0".to_vec()));
        assert_eq!(all_keys(&engine).len(), 100);
    }

    #[test]
    fn test_storage_engine_recovery() {
        let dir = tempdir().unwrap();

        {
            let engine = open(&dir, config());
            engine.put(b"persistent", b"data").unwrap();
            engine
                .write(vec![
                    (b"a".to_vec(), MemtableEntry::Value(b"1".to_vec())),
                    (b"b".to_vec(), MemtableEntry::Value(b"2".to_vec())),
                ])
                .unwrap();
            // Don't call close - simulate crash
        }

        let engine = open(&dir, config());
        assert_eq!(engine.get(b"persistent").unwrap(), Some(b"data".to_vec()));
        assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert!(engine.checkpoint_size() > 0);
    }

    #[test]
    fn test_checkpoint_persists_segments() {
        let dir = tempdir().unwrap();
        {
            let engine = open(&dir, config());
            engine.put(b"flushed", b"1").unwrap();
            engine.checkpoint().unwrap();
            assert_eq!(engine.checkpoint_size(), 0);
            engine.put(b"logged", b"2").unwrap();
        }

        let engine = open(&dir, config());
        let stats = engine.stats().unwrap();
        assert_eq!(stats.segment_count, 1);
        assert_eq!(stats.memtable_entries, 1);
        assert_eq!(engine.get(b"flushed").unwrap(), Some(b"1".to_vec()));
        assert_eq!(engine.get(b"logged").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_close_then_reopen() {
        let dir = tempdir().unwrap();
        {
            let engine = open(&dir, config());
            for i in 0..50 {
                engine.put(format!("k{:02}", i).as_bytes(), b"v").unwrap();
            }
            engine.close().unwrap();
            engine.close().unwrap();
        }

        let engine = open(&dir, config());
        assert_eq!(engine.stats().unwrap().memtable_entries, 0);
        assert_eq!(all_keys(&engine).len(), 50);
    }

    #[test]
    fn test_merge_drops_shadowed_versions() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                automerge: 2,
                autowork: false,
                ..config()
            },
        );

        for round in 0..4 {
            engine.put(b"same", format!("v{}", round).as_bytes()).unwrap();
            engine.put(format!("k{}", round).as_bytes(), b"x").unwrap();
            engine.flush().unwrap();
        }
        engine.delete(b"k0").unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.stats().unwrap().segment_count, 5);

        assert!(engine.work().unwrap() > 0);
        let stats = engine.stats().unwrap();
        assert!(stats.segment_count <= 2);
        assert_eq!(engine.get(b"same").unwrap(), Some(b"v3".to_vec()));
        assert_eq!(engine.get(b"k0").unwrap(), None);
        assert_eq!(
            all_keys(&engine),
            vec![b"k1".to_vec(), b"k2".to_vec(), b"k3".to_vec(), b"same".to_vec()]
        );
    }

    #[test]
    fn test_pinned_segments_survive_merge() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                automerge: 2,
                autowork: false,
                ..config()
            },
        );
        for i in 0..3 {
            engine.put(format!("k{}", i).as_bytes(), b"v").unwrap();
            engine.flush().unwrap();
        }

        let snapshot = engine.snapshot().unwrap();
        engine.work().unwrap();
        assert_eq!(engine.stats().unwrap().retired_segments, 2);

        let mut view = MergedView::new(snapshot.into_sources());
        assert_eq!(
            view.seek(Seek::Last).unwrap().map(|(k, _)| k),
            Some(b"k2".to_vec())
        );
        drop(view);

        engine.flush().unwrap();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.retired_segments, 0);
        assert!(stats.pending_blocks > 0);

        engine.checkpoint().unwrap();
        assert_eq!(engine.stats().unwrap().pending_blocks, 0);
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let dir = tempdir().unwrap();
        {
            let engine = open(&dir, config());
            engine.put(b"k", b"v").unwrap();
            engine.close().unwrap();
        }

        let engine = open(
            &dir,
            Config {
                readonly: true,
                ..config()
            },
        );
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(matches!(engine.put(b"k", b"w"), Err(Error::Misuse(_))));
        engine.close().unwrap();
    }

    #[test]
    fn test_reopen_adopts_file_geometry() {
        let dir = tempdir().unwrap();
        open(&dir, config()).close().unwrap();

        let engine = open(
            &dir,
            Config {
                page_size: 4096,
                block_size_kb: 1024,
                ..config()
            },
        );
        assert_eq!(engine.page_size(), 512);
        assert_eq!(engine.block_size_kb(), 64);
    }

    #[test]
    fn test_blocks_are_reused_after_checkpoint() {
        let dir = tempdir().unwrap();
        let engine = open(
            &dir,
            Config {
                automerge: 2,
                autowork: false,
                ..config()
            },
        );
        let value = vec![b'v'; 200];
        for _ in 0..6 {
            for i in 0..100 {
                engine.put(format!("k{:03}", i).as_bytes(), &value).unwrap();
            }
            engine.flush().unwrap();
            engine.work().unwrap();
            engine.checkpoint().unwrap();
        }
        let stats = engine.stats().unwrap();
        assert!(stats.free_blocks > 0);
        assert!(stats.total_blocks < 40);
    }
}
