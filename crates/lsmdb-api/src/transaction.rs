//! Nested transactions
//!
//! Open transactions form a stack of private overlays. Writes made while a
//! frame is open land in the innermost overlay; reads consult the overlays
//! innermost first before falling through to the engine. Committing an
//! inner frame folds it into its parent. Committing the outermost frame
//! hands its contents to the engine as one logged group.

use crate::Database;
use lsmdb_core::{Error, Result};
use lsmdb_storage::{Memtable, MemtableEntry};
use tracing::warn;

/// Identifies a frame for the lifetime of the stack.
pub(crate) type FrameId = u64;

#[derive(Debug)]
pub(crate) struct Frame {
    id: FrameId,
    overlay: Memtable,
}

impl Frame {
    /// The frame's writes as one engine batch.
    pub(crate) fn batch(&self) -> Vec<(Vec<u8>, MemtableEntry)> {
        self.overlay.snapshot().into_entries().collect()
    }
}

/// Outcome of popping the top frame.
#[derive(Debug)]
pub(crate) enum Commit {
    /// No frame was open
    Empty,
    /// The frame was folded into its parent
    Folded,
    /// The outermost frame; its writes still have to reach the engine
    Outermost(Frame),
}

/// The stack of open transaction frames, outermost first.
#[derive(Debug, Default)]
pub(crate) struct TxnStack {
    frames: Vec<Frame>,
    next_id: FrameId,
}

impl TxnStack {
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes an empty frame.
    pub(crate) fn begin(&mut self) -> FrameId {
        self.next_id += 1;
        self.frames.push(Frame {
            id: self.next_id,
            overlay: Memtable::new(),
        });
        self.next_id
    }

    pub(crate) fn top_id(&self) -> Option<FrameId> {
        self.frames.last().map(|f| f.id)
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Memtable> {
        self.frames.last_mut().map(|f| &mut f.overlay)
    }

    /// The innermost overlay entry for `key`.
    pub(crate) fn lookup(&self, key: &[u8]) -> Option<&MemtableEntry> {
        self.frames.iter().rev().find_map(|f| f.overlay.entry(key))
    }

    /// Snapshots of every overlay, innermost first.
    pub(crate) fn overlays(&self) -> Vec<Memtable> {
        self.frames.iter().rev().map(|f| f.overlay.snapshot()).collect()
    }

    pub(crate) fn commit(&mut self) -> Commit {
        let Some(frame) = self.frames.pop() else {
            return Commit::Empty;
        };
        match self.frames.last_mut() {
            Some(parent) => {
                parent.overlay.merge_from(frame.overlay);
                Commit::Folded
            }
            None => Commit::Outermost(frame),
        }
    }

    /// Puts back an outermost frame whose writes the engine refused.
    pub(crate) fn restore(&mut self, frame: Frame) {
        self.frames.insert(0, frame);
    }

    /// Discards the top frame's writes. With `keep` the frame stays open,
    /// empty and under the same id.
    pub(crate) fn rollback(&mut self, keep: bool) -> bool {
        if keep {
            match self.frames.last_mut() {
                Some(frame) => {
                    frame.overlay.clear();
                    true
                }
                None => false,
            }
        } else {
            self.frames.pop().is_some()
        }
    }

    /// Discards `id` and every frame opened after it.
    pub(crate) fn rollback_to(&mut self, id: FrameId) -> usize {
        match self.frames.iter().position(|f| f.id == id) {
            Some(at) => {
                let dropped = self.frames.len() - at;
                self.frames.truncate(at);
                dropped
            }
            None => 0,
        }
    }

    /// Discards every frame.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        dropped
    }
}

/// A transaction frame bound to a scope.
///
/// Created by [`Database::transaction`]. [`commit`](Self::commit) and
/// [`rollback`](Self::rollback) act on the guard's own frame and leave a
/// fresh frame open; [`finish`](Self::finish) commits and closes it.
/// Dropping an unfinished guard rolls its frame back, so an early return
/// through `?` or a panic leaves no partial writes behind.
///
/// # Examples
///
/// ```rust,no_run
/// use lsmdb::Database;
///
/// let db = Database::open("app.lsm")?;
/// {
///     let mut txn = db.transaction()?;
///     db.insert(b"k1", b"v1")?;
///     txn.commit()?;
///     db.insert(b"k2", b"v2")?;
///     txn.rollback()?;
/// } // nothing left to undo: k1 is kept, k2 was discarded
/// assert_eq!(db.get(b"k2")?, None);
/// # Ok::<(), lsmdb::Error>(())
/// ```
#[must_use = "dropping the guard immediately rolls the transaction back"]
pub struct Transaction<'db> {
    db: &'db Database,
    frame: FrameId,
    finished: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database, frame: FrameId) -> Self {
        Self {
            db,
            frame,
            finished: false,
        }
    }

    /// Commits the frame's writes and opens a new frame in its place.
    pub fn commit(&mut self) -> Result<()> {
        let (reopened, logged) = self.db.commit_frame(self.frame, true)?;
        self.frame = reopened.unwrap_or(self.frame);
        self.db.settle_commit(logged)
    }

    /// Discards the frame's writes; the frame stays open.
    pub fn rollback(&mut self) -> Result<()> {
        self.db.rollback_frame(self.frame, true)
    }

    /// Commits the frame's writes and closes it. If the commit fails the
    /// frame is rolled back.
    pub fn finish(mut self) -> Result<()> {
        let (_, logged) = self.db.commit_frame(self.frame, false)?;
        self.finished = true;
        self.db.settle_commit(logged)
    }

    /// Discards the frame's writes and closes it.
    pub fn abort(mut self) -> Result<()> {
        self.db.rollback_frame(self.frame, false)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.db.abandon_frame(self.frame) {
            Ok(0) => {}
            Ok(dropped) => warn!(frames = dropped, "Rolled back unfinished transaction"),
            Err(e) => warn!(error = %e, "Failed to roll back unfinished transaction"),
        }
    }
}

/// Checks that a guard's frame is the one writes currently go to.
pub(crate) fn ensure_top(stack: &TxnStack, frame: FrameId) -> Result<()> {
    match stack.top_id() {
        Some(top) if top == frame => Ok(()),
        Some(_) => Err(Error::Misuse(
            "transaction is not the innermost open transaction".into(),
        )),
        None => Err(Error::Misuse("transaction is no longer open".into())),
    }
}
