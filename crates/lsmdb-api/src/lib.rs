//! # lsmdb
//!
//! An embedded, ordered, durable key-value store built on a log-structured
//! merge tree, with nested transactions and cursors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lsmdb::Database;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open("./app.lsm")?;
//!
//!     db.insert(b"user:1:name", b"Alice")?;
//!     db.insert(b"user:1:email", b"alice@example.com")?;
//!
//!     if let Some(name) = db.get(b"user:1:name")? {
//!         println!("Name: {}", String::from_utf8_lossy(&name));
//!     }
//!
//!     for entry in db.range(Some(b"user:1:"), Some(b"user:1:~"))? {
//!         let (key, value) = entry?;
//!         println!("{} = {}", String::from_utf8_lossy(&key), String::from_utf8_lossy(&value));
//!     }
//!
//!     db.delete(b"user:1:email")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! use lsmdb::Database;
//!
//! let db = Database::open("./app.lsm")?;
//! db.with_transaction(|db| {
//!     db.insert(b"balance:alice", b"90")?;
//!     db.insert(b"balance:bob", b"110")?;
//!     Ok(())
//! })?;
//! # Ok::<(), lsmdb::Error>(())
//! ```
//!
//! ## Layout
//!
//! Everything lives in one file: two header slots, a write-ahead log and
//! immutable sorted segments, all allocated in fixed-size blocks. Writes go
//! to the log and an in-memory buffer; the buffer is flushed to segments,
//! segments are merged, and checkpoints make the result durable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

pub mod cursor;
pub mod logging;
pub mod transaction;

pub use cursor::{Cursor, Entries, Entry, RangeIter, SeekMode};
pub use transaction::Transaction;

// Re-export core types
pub use lsmdb_core::{Config, Error, Result, Safety};

// Storage components
pub use lsmdb_storage::{MergeStats, StorageStats};

use lsmdb_core::validate::{validate_entry, validate_key};
use lsmdb_storage::{Memtable, MemtableEntry, MergedView, Seek, SortedSource, StorageEngine};
use transaction::{ensure_top, Commit, FrameId, TxnStack};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

struct DatabaseInner {
    engine: StorageEngine,
    txn: RwLock<TxnStack>,
    path: PathBuf,
}

impl DatabaseInner {
    fn close(&self) -> Result<()> {
        if self.engine.is_closed() {
            return Ok(());
        }
        let dropped = self.txn.write().map_err(|_| Error::LockPoisoned)?.clear();
        if dropped > 0 {
            warn!(frames = dropped, "Rolled back open transactions at close");
        }
        self.engine.close()
    }
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close database");
        }
    }
}

/// The main database handle.
///
/// Cheap to clone; clones share the same open file, memory buffer and
/// transaction stack, and may be used from any thread. The file is closed
/// by [`close`](Self::close) or when the last clone is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use lsmdb::Database;
///
/// let db = Database::open("./app.lsm")?;
/// db.insert(b"key", b"value")?;
///
/// // Data persists across restarts
/// db.close()?;
/// let db = Database::open("./app.lsm")?;
/// assert_eq!(db.get(b"key")?, Some(b"value".to_vec()));
/// # Ok::<(), lsmdb::Error>(())
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Opens the database file at `path`, creating it if needed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// db.insert(b"hello", b"world")?;
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database with custom configuration.
    ///
    /// An existing file keeps the page and block size it was created with;
    /// the values in `config` only apply to new files.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::{Config, Database, Safety};
    ///
    /// let config = Config {
    ///     safety: Safety::Full,
    ///     autoflush_kb: 256,
    ///     ..Config::default()
    /// };
    /// let db = Database::open_with_config("./app.lsm", config)?;
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let engine = StorageEngine::open(&path, config)?;
        Ok(Database {
            inner: Arc::new(DatabaseInner {
                engine,
                txn: RwLock::new(TxnStack::default()),
                path,
            }),
        })
    }

    /// Rolls back open transactions, checkpoints and releases the file.
    ///
    /// Closing twice is harmless. Every other operation on a closed handle,
    /// or on any of its clones, fails with [`Error::Misuse`].
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    pub fn is_open(&self) -> bool {
        !self.inner.engine.is_closed()
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn engine(&self) -> Result<&StorageEngine> {
        if self.inner.engine.is_closed() {
            return Err(Error::Misuse("database is closed".into()));
        }
        Ok(&self.inner.engine)
    }

    fn writable(&self) -> Result<&StorageEngine> {
        let engine = self.engine()?;
        if engine.is_readonly() {
            return Err(Error::Misuse("database was opened readonly".into()));
        }
        Ok(engine)
    }

    fn read_txn(&self) -> Result<RwLockReadGuard<'_, TxnStack>> {
        self.inner.txn.read().map_err(|_| Error::LockPoisoned)
    }

    fn write_txn(&self) -> Result<RwLockWriteGuard<'_, TxnStack>> {
        self.inner.txn.write().map_err(|_| Error::LockPoisoned)
    }

    /// Sends `batch` to the innermost open frame, or logs it to the engine
    /// when no transaction is open.
    ///
    /// Returns `true` when the batch reached the engine; the caller must then
    /// release the transaction lock and call [`settle`](Self::settle).
    fn apply_locked(
        engine: &StorageEngine,
        txn: &mut TxnStack,
        batch: Vec<(Vec<u8>, MemtableEntry)>,
    ) -> Result<bool> {
        match txn.top_mut() {
            Some(overlay) => {
                for (key, entry) in batch {
                    overlay.insert(key, entry);
                }
                Ok(false)
            }
            None => engine.write_logged(batch),
        }
    }

    /// Runs the flush, checkpoint or merge a logged write made due. Must be
    /// called without the transaction lock, or readers stall behind it.
    fn settle(engine: &StorageEngine, logged: bool) -> Result<()> {
        if logged {
            engine.maybe_autowork()?;
        }
        Ok(())
    }

    /// Like [`apply_locked`](Self::apply_locked), but lets readers back in
    /// before the engine write and any flush or merge it triggers.
    fn apply(
        engine: &StorageEngine,
        mut txn: RwLockWriteGuard<'_, TxnStack>,
        batch: Vec<(Vec<u8>, MemtableEntry)>,
    ) -> Result<()> {
        if txn.depth() > 0 {
            return Self::apply_locked(engine, &mut txn, batch).map(|_| ());
        }
        drop(txn);
        engine.write(batch)
    }

    fn lookup(engine: &StorageEngine, txn: &TxnStack, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match txn.lookup(key) {
            Some(entry) => Ok(entry.value().map(<[u8]>::to_vec)),
            None => engine.get(key),
        }
    }

    fn view(engine: &StorageEngine, txn: &TxnStack) -> Result<MergedView> {
        let mut sources: Vec<Box<dyn SortedSource>> = txn
            .overlays()
            .into_iter()
            .map(|overlay: Memtable| Box::new(overlay) as Box<dyn SortedSource>)
            .collect();
        sources.extend(engine.snapshot()?.into_sources());
        Ok(MergedView::new(sources))
    }

    // ----- Mutation -----

    /// Inserts or replaces the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// db.insert(b"name", b"Alice")?;
    /// db.insert(b"name", b"Bob")?; // Updates the value
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_entry(key, value)?;
        let engine = self.writable()?;
        let txn = self.write_txn()?;
        Self::apply(
            engine,
            txn,
            vec![(key.to_vec(), MemtableEntry::Value(value.to_vec()))],
        )
    }

    /// Removes `key`. Removing a missing key is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        let engine = self.writable()?;
        let txn = self.write_txn()?;
        Self::apply(engine, txn, vec![(key.to_vec(), MemtableEntry::Tombstone)])
    }

    /// Removes every key strictly between `start` and `end`.
    ///
    /// The endpoints themselves survive. Nothing happens when
    /// `start >= end`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// for key in [b"k3", b"k4", b"k5"] {
    ///     db.insert(key, b"v")?;
    /// }
    /// db.delete_range(b"k3", b"k5")?;
    /// assert!(db.contains(b"k3")?);
    /// assert!(!db.contains(b"k4")?);
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn delete_range(&self, start: &[u8], end: &[u8]) -> Result<()> {
        validate_key(start)?;
        validate_key(end)?;
        let engine = self.writable()?;
        if start >= end {
            return Ok(());
        }
        let mut txn = self.write_txn()?;

        let mut view = Self::view(engine, &txn)?;
        let mut batch = Vec::new();
        let mut found = view.seek(Seek::Gt(start))?;
        while let Some((key, _)) = found {
            if key.as_slice() >= end {
                break;
            }
            found = view.seek(Seek::Gt(&key))?;
            batch.push((key, MemtableEntry::Tombstone));
        }
        let logged = Self::apply_locked(engine, &mut txn, batch)?;
        drop(txn);
        Self::settle(engine, logged)
    }

    /// Adds one to the decimal counter stored under `key` and returns the
    /// new value. A missing key counts from zero.
    ///
    /// Fails with [`Error::InvalidArgument`] when the stored value is not
    /// an ASCII integer.
    pub fn increment(&self, key: &[u8]) -> Result<i64> {
        validate_key(key)?;
        let engine = self.writable()?;
        let mut txn = self.write_txn()?;

        let current = match Self::lookup(engine, &txn, key)? {
            None => 0,
            Some(raw) => std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "value under key {:?} is not an integer",
                        String::from_utf8_lossy(key)
                    ))
                })?,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::InvalidArgument("counter overflow".into()))?;
        let logged = Self::apply_locked(
            engine,
            &mut txn,
            vec![(
                key.to_vec(),
                MemtableEntry::Value(next.to_string().into_bytes()),
            )],
        )?;
        drop(txn);
        Self::settle(engine, logged)?;
        Ok(next)
    }

    /// Inserts every pair as one atomic write.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// db.update([(b"k1", b"v1"), (b"k2", b"v2")])?;
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn update<I, K, V>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let batch = pairs
            .into_iter()
            .map(|(key, value)| {
                let (key, value) = (key.as_ref(), value.as_ref());
                validate_entry(key, value)?;
                Ok((key.to_vec(), MemtableEntry::Value(value.to_vec())))
            })
            .collect::<Result<Vec<_>>>()?;
        let engine = self.writable()?;
        let txn = self.write_txn()?;
        Self::apply(engine, txn, batch)
    }

    // ----- Lookup -----

    /// Retrieves the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// db.insert(b"greeting", b"Hello!")?;
    ///
    /// match db.get(b"greeting")? {
    ///     Some(value) => println!("Found: {}", String::from_utf8_lossy(&value)),
    ///     None => println!("Key not found"),
    /// }
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let engine = self.engine()?;
        let txn = self.read_txn()?;
        Self::lookup(engine, &txn, key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// The entry `mode` selects relative to `key`, if any.
    pub fn get_nearest(&self, key: &[u8], mode: SeekMode) -> Result<Option<Entry>> {
        validate_key(key)?;
        let engine = self.engine()?;
        let txn = self.read_txn()?;
        match mode {
            SeekMode::Eq => Ok(Self::lookup(engine, &txn, key)?.map(|value| (key.to_vec(), value))),
            SeekMode::Le => Self::view(engine, &txn)?.seek(Seek::Le(key)),
            SeekMode::Ge => Self::view(engine, &txn)?.seek(Seek::Ge(key)),
        }
    }

    /// Looks up several keys at once. Missing keys are left out.
    pub fn get_many<I, K>(&self, keys: I) -> Result<HashMap<Vec<u8>, Vec<u8>>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let engine = self.engine()?;
        let txn = self.read_txn()?;
        let mut found = HashMap::new();
        for key in keys {
            let key = key.as_ref();
            validate_key(key)?;
            if let Some(value) = Self::lookup(engine, &txn, key)? {
                found.insert(key.to_vec(), value);
            }
        }
        Ok(found)
    }

    // ----- Range reads -----

    /// Opens a cursor over a snapshot of the database.
    pub fn cursor(&self, reverse: bool) -> Result<Cursor> {
        let engine = self.engine()?;
        let txn = self.read_txn()?;
        Ok(Cursor::new(Self::view(engine, &txn)?, reverse))
    }

    /// Every entry in ascending key order.
    pub fn iter(&self) -> Result<RangeIter> {
        Ok(RangeIter::new(self.cursor(false)?, None))
    }

    /// Every entry in descending key order.
    pub fn iter_rev(&self) -> Result<RangeIter> {
        Ok(RangeIter::new(self.cursor(true)?, None))
    }

    pub fn keys(&self, reverse: bool) -> Result<impl Iterator<Item = Result<Vec<u8>>>> {
        Ok(RangeIter::new(self.cursor(reverse)?, None).keys())
    }

    pub fn values(&self, reverse: bool) -> Result<impl Iterator<Item = Result<Vec<u8>>>> {
        Ok(RangeIter::new(self.cursor(reverse)?, None).values())
    }

    /// Entries from `start` to `end`, both included; `None` leaves that
    /// side open.
    ///
    /// When both bounds are given and `start > end` the walk runs downward
    /// from `start` to `end`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use lsmdb::Database;
    ///
    /// let db = Database::open("./app.lsm")?;
    /// let up: Vec<_> = db.range(Some(b"k4"), Some(b"k7"))?.collect();
    /// let down: Vec<_> = db.range(Some(b"k7"), Some(b"k4"))?.collect();
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<RangeIter> {
        match (start, end) {
            (Some(start), Some(end)) if start > end => self.walk(true, Some(start), Some(end)),
            _ => self.walk(false, start, end),
        }
    }

    /// Entries between two bounds in descending order, both included.
    ///
    /// The bounds may come in either order. Given alone, `start` is the
    /// lower bound and `end` the upper one.
    pub fn range_reverse(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<RangeIter> {
        let (low, high) = match (start, end) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            bounds => bounds,
        };
        self.walk(true, high, low)
    }

    /// Walks from `from` towards `to` in the given direction.
    fn walk(&self, reverse: bool, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<RangeIter> {
        let mut cursor = self.cursor(reverse)?;
        match (from, reverse) {
            (Some(key), false) => cursor.place(Seek::Ge(key))?,
            (Some(key), true) => cursor.place(Seek::Le(key))?,
            (None, false) => cursor.first()?,
            (None, true) => cursor.last()?,
        }
        Ok(RangeIter::new(cursor, to.map(<[u8]>::to_vec)))
    }

    // ----- Transactions -----

    /// Opens a transaction frame and returns the new depth.
    pub fn begin(&self) -> Result<usize> {
        self.writable()?;
        let mut txn = self.write_txn()?;
        txn.begin();
        Ok(txn.depth())
    }

    /// Commits the innermost frame. Returns `false` when none is open.
    pub fn commit(&self) -> Result<bool> {
        let engine = self.engine()?;
        let mut txn = self.write_txn()?;
        let committed = Self::commit_top(engine, &mut txn)?;
        drop(txn);
        Self::settle(engine, committed == Some(true))?;
        Ok(committed.is_some())
    }

    /// Discards the innermost frame's writes. With `keep_transaction` the
    /// frame stays open, so the depth does not change. Returns `false` when
    /// no frame is open.
    pub fn rollback(&self, keep_transaction: bool) -> Result<bool> {
        self.engine()?;
        Ok(self.write_txn()?.rollback(keep_transaction))
    }

    /// Number of open transaction frames.
    pub fn transaction_depth(&self) -> Result<usize> {
        Ok(self.read_txn()?.depth())
    }

    /// Opens a transaction frame bound to the returned guard.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        self.writable()?;
        let frame = self.write_txn()?.begin();
        Ok(Transaction::new(self, frame))
    }

    /// Runs `f` inside a transaction: commits when it returns `Ok`, rolls
    /// back when it returns `Err` or panics.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        let txn = self.transaction()?;
        match f(self) {
            Ok(value) => {
                txn.finish()?;
                Ok(value)
            }
            Err(e) => {
                // The closure's error wins; dropping the guard still rolls
                // back whatever frames it left open.
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "Failed to abort transaction cleanly");
                }
                Err(e)
            }
        }
    }

    /// Pops the innermost frame. `None` when no frame was open, otherwise
    /// whether the frame's writes were logged to the engine.
    fn commit_top(engine: &StorageEngine, txn: &mut TxnStack) -> Result<Option<bool>> {
        match txn.commit() {
            Commit::Empty => Ok(None),
            Commit::Folded => Ok(Some(false)),
            Commit::Outermost(frame) => match engine.write_logged(frame.batch()) {
                Ok(logged) => Ok(Some(logged)),
                Err(e) => {
                    txn.restore(frame);
                    Err(e)
                }
            },
        }
    }

    /// Commits a guard's frame, reopening a fresh one when asked. The
    /// returned flag goes to [`settle_commit`](Self::settle_commit) once the
    /// guard has recorded the new frame.
    pub(crate) fn commit_frame(
        &self,
        frame: FrameId,
        reopen: bool,
    ) -> Result<(Option<FrameId>, bool)> {
        let engine = self.engine()?;
        let mut txn = self.write_txn()?;
        ensure_top(&txn, frame)?;
        let logged = Self::commit_top(engine, &mut txn)? == Some(true);
        Ok((reopen.then(|| txn.begin()), logged))
    }

    pub(crate) fn settle_commit(&self, logged: bool) -> Result<()> {
        Self::settle(self.engine()?, logged)
    }

    pub(crate) fn rollback_frame(&self, frame: FrameId, keep: bool) -> Result<()> {
        self.engine()?;
        let mut txn = self.write_txn()?;
        ensure_top(&txn, frame)?;
        txn.rollback(keep);
        Ok(())
    }

    pub(crate) fn abandon_frame(&self, frame: FrameId) -> Result<usize> {
        Ok(self.write_txn()?.rollback_to(frame))
    }

    // ----- Maintenance -----

    /// Writes the memory buffer out as a segment.
    pub fn flush(&self) -> Result<()> {
        self.writable()?.flush().map(|_| ())
    }

    /// Makes everything written so far durable and trims the log.
    pub fn checkpoint(&self) -> Result<()> {
        self.writable()?.checkpoint()
    }

    /// Runs merges until the segment count is within `automerge`.
    /// Returns the number of merges performed.
    pub fn work(&self) -> Result<usize> {
        self.writable()?.work()
    }

    // ----- Configuration -----

    /// Current configuration, including runtime changes
    pub fn config(&self) -> Result<Config> {
        self.engine()?.config()
    }

    pub fn set_safety(&self, safety: Safety) -> Result<()> {
        self.engine()?.set_safety(safety)
    }

    /// Flush threshold in KB of buffered data.
    pub fn set_autoflush(&self, kb: u64) -> Result<()> {
        self.engine()?.set_autoflush(kb)
    }

    /// Checkpoint threshold in KB of logged data; 0 checkpoints only on
    /// demand.
    pub fn set_autocheckpoint(&self, kb: u64) -> Result<()> {
        self.engine()?.set_autocheckpoint(kb)
    }

    /// Segment count above which a merge runs; 1 disables merging.
    pub fn set_automerge(&self, segments: usize) -> Result<()> {
        self.engine()?.set_automerge(segments)
    }

    pub fn set_autowork(&self, enabled: bool) -> Result<()> {
        self.engine()?.set_autowork(enabled)
    }

    /// Page size is fixed once the file exists: asking for the current
    /// value returns it, anything else is [`Error::Config`].
    pub fn set_page_size(&self, page_size: u32) -> Result<u32> {
        let current = self.engine()?.page_size();
        if page_size != current {
            return Err(Error::Config(format!(
                "page size is fixed at {} bytes for an open database",
                current
            )));
        }
        Ok(current)
    }

    /// Block size, in KB, is fixed once the file exists.
    pub fn set_block_size(&self, block_size_kb: u32) -> Result<u32> {
        let current = self.engine()?.block_size_kb();
        if block_size_kb != current {
            return Err(Error::Config(format!(
                "block size is fixed at {} KB for an open database",
                current
            )));
        }
        Ok(current)
    }

    pub fn page_size(&self) -> Result<u32> {
        Ok(self.engine()?.page_size())
    }

    pub fn block_size(&self) -> Result<u32> {
        Ok(self.engine()?.block_size_kb())
    }

    // ----- Observability -----

    /// Segment data pages written since open.
    pub fn pages_written(&self) -> Result<u64> {
        Ok(self.engine()?.pages_written())
    }

    /// Segment data pages read since open. Hits in the memory buffer or
    /// in transaction overlays are not page reads.
    pub fn pages_read(&self) -> Result<u64> {
        Ok(self.engine()?.pages_read())
    }

    /// Bytes logged since the last checkpoint.
    pub fn checkpoint_size(&self) -> Result<u64> {
        Ok(self.engine()?.checkpoint_size())
    }

    pub fn stats(&self) -> Result<StorageStats> {
        self.engine()?.stats()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.inner.path)
            .field("open", &self.is_open())
            .finish()
    }
}
