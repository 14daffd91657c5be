//! Cursors over a consistent snapshot of the database
//!
//! A cursor is opened over the transaction overlays, the memory buffer and
//! the segment list as they were at that instant. Later writes, flushes
//! and merges are invisible to it, and the segments it reads stay on disk
//! until it is dropped.

use lsmdb_core::{Error, Result};
use lsmdb_storage::{MergedView, Seek};

/// How [`Cursor::seek`] matches its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Exact match only. The cursor cannot be moved afterwards.
    #[default]
    Eq,
    /// Greatest key less than or equal to the target
    Le,
    /// Least key greater than or equal to the target
    Ge,
}

/// An entry as returned by iteration
pub type Entry = (Vec<u8>, Vec<u8>);

#[derive(Debug)]
enum State {
    Unpositioned,
    Positioned {
        key: Vec<u8>,
        value: Vec<u8>,
        /// Placed by an `Eq` seek
        exact: bool,
    },
    Exhausted,
    Failed,
}

/// A positioned reader over an ordered snapshot.
///
/// Cursors move explicitly with [`seek`](Self::seek), [`first`](Self::first),
/// [`last`](Self::last), [`next`](Self::next) and
/// [`previous`](Self::previous), or iterate through `&mut Cursor` in their
/// natural direction. Iteration yields the current entry and then advances;
/// it is single-pass, so a drained cursor yields nothing until it is
/// repositioned.
///
/// # Examples
///
/// ```rust,no_run
/// use lsmdb::{Database, SeekMode};
///
/// let db = Database::open("app.lsm")?;
/// let mut cursor = db.cursor(false)?;
/// cursor.seek(b"user:", SeekMode::Ge)?;
/// for entry in cursor.fetch_until(b"user:~") {
///     let (key, value) = entry?;
///     println!("{:?} = {:?}", key, value);
/// }
/// # Ok::<(), lsmdb::Error>(())
/// ```
pub struct Cursor {
    view: MergedView,
    reverse: bool,
    state: State,
    /// Raised while advancing past an entry that was already handed out
    deferred: Option<Error>,
}

impl Cursor {
    pub(crate) fn new(view: MergedView, reverse: bool) -> Self {
        Self {
            view,
            reverse,
            state: State::Unpositioned,
            deferred: None,
        }
    }

    /// Whether iteration runs from the greatest key down
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Whether the cursor currently points at an entry
    pub fn is_valid(&self) -> bool {
        matches!(self.state, State::Positioned { .. })
    }

    /// Whether the cursor ran off either end of the keyspace
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// Key at the current position
    pub fn key(&self) -> Option<&[u8]> {
        match &self.state {
            State::Positioned { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Value at the current position
    pub fn value(&self) -> Option<&[u8]> {
        match &self.state {
            State::Positioned { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Positions the cursor according to `mode`.
    ///
    /// Fails with [`Error::NotFound`] when no key qualifies.
    pub fn seek(&mut self, key: &[u8], mode: SeekMode) -> Result<()> {
        let target = match mode {
            SeekMode::Eq | SeekMode::Ge => Seek::Ge(key),
            SeekMode::Le => Seek::Le(key),
        };
        self.place(target)?;
        let found = match &mut self.state {
            State::Positioned {
                key: found, exact, ..
            } if mode == SeekMode::Eq => {
                *exact = true;
                found.as_slice() == key
            }
            State::Positioned { .. } => true,
            _ => false,
        };
        if !found {
            self.state = State::Failed;
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Moves to the smallest key. An empty snapshot exhausts the cursor.
    pub fn first(&mut self) -> Result<()> {
        self.place(Seek::First)
    }

    /// Moves to the greatest key. An empty snapshot exhausts the cursor.
    pub fn last(&mut self) -> Result<()> {
        self.place(Seek::Last)
    }

    /// Moves to the next greater key.
    pub fn next(&mut self) -> Result<()> {
        self.step(true)
    }

    /// Moves to the next lesser key.
    pub fn previous(&mut self) -> Result<()> {
        self.step(false)
    }

    /// Iterates from the current position in the cursor's direction.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries { cursor: self }
    }

    /// Keys from the current position, in the cursor's direction.
    pub fn keys(&mut self) -> impl Iterator<Item = Result<Vec<u8>>> + '_ {
        self.entries().map(|entry| entry.map(|(key, _)| key))
    }

    /// Values from the current position, in the cursor's direction.
    pub fn values(&mut self) -> impl Iterator<Item = Result<Vec<u8>>> + '_ {
        self.entries().map(|entry| entry.map(|(_, value)| value))
    }

    /// Yields entries from the current position up to `end`.
    ///
    /// Forward cursors stop after the last key `<= end`, reverse cursors
    /// after the last key `>= end`; `end` itself need not exist.
    pub fn fetch_until(self, end: &[u8]) -> RangeIter {
        RangeIter::new(self, Some(end.to_vec()))
    }

    /// Yields the entries between two keys, both included.
    ///
    /// The bounds may be given in either order: a forward cursor walks from
    /// the lesser to the greater, a reverse cursor from the greater to the
    /// lesser. No key in the range gives an empty iterator.
    pub fn fetch_range(mut self, start: &[u8], end: &[u8]) -> Result<RangeIter> {
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        let (from, to) = if self.reverse {
            (Seek::Le(high), low)
        } else {
            (Seek::Ge(low), high)
        };
        self.place(from)?;
        Ok(RangeIter::new(self, Some(to.to_vec())))
    }

    /// Positions on whatever `seek` selects; nothing there exhausts the
    /// cursor.
    pub(crate) fn place(&mut self, seek: Seek<'_>) -> Result<()> {
        self.deferred = None;
        match self.view.seek(seek) {
            Ok(Some((key, value))) => {
                self.state = State::Positioned {
                    key,
                    value,
                    exact: false,
                };
                Ok(())
            }
            Ok(None) => {
                self.state = State::Exhausted;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn step(&mut self, forward: bool) -> Result<()> {
        let key = match &self.state {
            State::Positioned { exact: true, .. } => {
                self.state = State::Failed;
                return Err(Error::Misuse(
                    "cursor was positioned with SeekMode::Eq and cannot move".into(),
                ));
            }
            State::Positioned { key, .. } => key.clone(),
            State::Exhausted => return Ok(()),
            State::Unpositioned => {
                return Err(Error::Misuse("cursor is not positioned".into()));
            }
            State::Failed => {
                return Err(Error::Misuse("cursor is in a failed state".into()));
            }
        };
        if forward {
            self.place(Seek::Gt(&key))
        } else {
            self.place(Seek::Lt(&key))
        }
    }

    /// Hands out the current entry and advances in the natural direction.
    fn next_entry(&mut self) -> Option<Result<Entry>> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        if matches!(self.state, State::Unpositioned) {
            let start = if self.reverse { Seek::Last } else { Seek::First };
            if let Err(e) = self.place(start) {
                return Some(Err(e));
            }
        }
        match std::mem::replace(&mut self.state, State::Exhausted) {
            State::Positioned { key, value, exact } => {
                if !exact {
                    let next = if self.reverse {
                        self.view.seek(Seek::Lt(&key))
                    } else {
                        self.view.seek(Seek::Gt(&key))
                    };
                    match next {
                        Ok(Some((key, value))) => {
                            self.state = State::Positioned {
                                key,
                                value,
                                exact: false,
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            self.state = State::Failed;
                            self.deferred = Some(e);
                        }
                    }
                }
                Some(Ok((key, value)))
            }
            State::Failed => {
                self.state = State::Failed;
                None
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("reverse", &self.reverse)
            .field("state", &self.state)
            .field("sources", &self.view.source_count())
            .finish()
    }
}

/// Borrowing iterator over a cursor, see [`Cursor::entries`].
pub struct Entries<'a> {
    cursor: &'a mut Cursor,
}

impl Iterator for Entries<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_entry()
    }
}

impl<'a> IntoIterator for &'a mut Cursor {
    type Item = Result<Entry>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// Owning iterator over a cursor, optionally bounded by an end key.
///
/// Returned by [`Cursor::fetch_until`], [`Cursor::fetch_range`] and the
/// range reads on [`Database`](crate::Database).
pub struct RangeIter {
    cursor: Cursor,
    end: Option<Vec<u8>>,
    done: bool,
}

impl RangeIter {
    pub(crate) fn new(cursor: Cursor, end: Option<Vec<u8>>) -> Self {
        Self {
            cursor,
            end,
            done: false,
        }
    }

    fn within(&self, key: &[u8]) -> bool {
        match &self.end {
            None => true,
            Some(end) if self.cursor.reverse => key >= end.as_slice(),
            Some(end) => key <= end.as_slice(),
        }
    }

    /// Keys only
    pub fn keys(self) -> impl Iterator<Item = Result<Vec<u8>>> {
        self.map(|entry| entry.map(|(key, _)| key))
    }

    /// Values only
    pub fn values(self) -> impl Iterator<Item = Result<Vec<u8>>> {
        self.map(|entry| entry.map(|(_, value)| value))
    }
}

impl Iterator for RangeIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next_entry() {
            Some(Ok((key, value))) if self.within(&key) => Some(Ok((key, value))),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

impl std::fmt::Debug for RangeIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsmdb_storage::{Memtable, SortedSource};

    fn cursor(reverse: bool) -> Cursor {
        let mut mt = Memtable::new();
        for (k, v) in [
            ("bb", "bbb"),
            ("gg", "ggg"),
            ("aa", "aaa"),
            ("dd", "ddd"),
            ("zz", "zzz"),
            ("ee", "eee"),
            ("bbb", "bbb"),
        ] {
            mt.put(k.as_bytes().to_vec(), v.as_bytes().to_vec());
        }
        let sources: Vec<Box<dyn SortedSource>> = vec![Box::new(mt)];
        Cursor::new(MergedView::new(sources), reverse)
    }

    fn keys<I: Iterator<Item = Result<Entry>>>(iter: I) -> Vec<String> {
        iter.map(|e| String::from_utf8(e.unwrap().0).unwrap()).collect()
    }

    #[test]
    fn test_iterates_in_natural_direction() {
        assert_eq!(
            keys(cursor(false).entries()),
            ["aa", "bb", "bbb", "dd", "ee", "gg", "zz"]
        );
        assert_eq!(
            keys(cursor(true).entries()),
            ["zz", "gg", "ee", "dd", "bbb", "bb", "aa"]
        );
    }

    #[test]
    fn test_seek_modes() {
        let mut c = cursor(false);
        c.seek(b"cccc", SeekMode::Ge).unwrap();
        assert_eq!(c.key(), Some(&b"dd"[..]));
        assert_eq!(c.value(), Some(&b"ddd"[..]));

        c.seek(b"cccc", SeekMode::Le).unwrap();
        assert_eq!(c.key(), Some(&b"bbb"[..]));

        assert!(matches!(c.seek(b"cccc", SeekMode::Eq), Err(Error::NotFound)));
        assert!(!c.is_valid());
        assert!(matches!(c.seek(b"zzz", SeekMode::Ge), Err(Error::NotFound)));
    }

    #[test]
    fn test_eq_seek_cannot_move() {
        let mut c = cursor(false);
        c.seek(b"dd", SeekMode::Eq).unwrap();
        let err = c.next().unwrap_err();
        assert_eq!(err.code(), 21);

        c.seek(b"dd", SeekMode::Eq).unwrap();
        assert!(matches!(c.previous(), Err(Error::Misuse(_))));

        // Re-seeking recovers, and an exact cursor yields its one entry.
        c.seek(b"dd", SeekMode::Eq).unwrap();
        assert_eq!(keys(c.entries()), ["dd"]);
    }

    #[test]
    fn test_explicit_moves() {
        let mut c = cursor(false);
        assert!(matches!(c.next(), Err(Error::Misuse(_))));

        c.last().unwrap();
        assert_eq!(c.key(), Some(&b"zz"[..]));
        c.previous().unwrap();
        assert_eq!(c.key(), Some(&b"gg"[..]));
        c.next().unwrap();
        c.next().unwrap();
        assert!(c.is_exhausted());
        assert!(c.next().is_ok());
        assert!(c.key().is_none());

        c.first().unwrap();
        assert_eq!(c.key(), Some(&b"aa"[..]));
    }

    #[test]
    fn test_single_pass() {
        let mut c = cursor(true);
        assert_eq!(c.entries().count(), 7);
        assert_eq!(c.entries().count(), 0);
        c.last().unwrap();
        assert_eq!(c.keys().count(), 7);
        assert_eq!(c.keys().count(), 0);
        c.last().unwrap();
        let values: Vec<_> = c.values().map(|v| v.unwrap()).collect();
        assert_eq!(values.first().map(Vec::as_slice), Some(&b"zzz"[..]));
    }

    #[test]
    fn test_fetch_until() {
        let mut c = cursor(false);
        c.seek(b"bbb", SeekMode::Ge).unwrap();
        assert_eq!(keys(c.fetch_until(b"ee")), ["bbb", "dd", "ee"]);

        let mut c = cursor(false);
        c.seek(b"bbb", SeekMode::Ge).unwrap();
        assert_eq!(keys(c.fetch_until(b"ef")), ["bbb", "dd", "ee"]);

        let mut c = cursor(false);
        c.seek(b"a", SeekMode::Ge).unwrap();
        assert_eq!(keys(c.fetch_until(b"bx")), ["aa", "bb", "bbb"]);

        let mut c = cursor(true);
        c.seek(b"ee", SeekMode::Le).unwrap();
        assert_eq!(keys(c.fetch_until(b"bba")), ["ee", "dd", "bbb"]);
    }

    #[test]
    fn test_fetch_range_forward() {
        let range = |a: &str, b: &str| {
            keys(cursor(false).fetch_range(a.as_bytes(), b.as_bytes()).unwrap())
        };
        assert_eq!(range("bb", "ee"), ["bb", "bbb", "dd", "ee"]);
        assert_eq!(range("a", "cc"), ["aa", "bb", "bbb"]);
        assert_eq!(range("foo", "zzzz"), ["gg", "zz"]);
        assert_eq!(range("eee", "ba"), ["bb", "bbb", "dd", "ee"]);
        assert!(range("zzzz", "zzzzz").is_empty());
        assert!(range("a", "aA").is_empty());
    }

    #[test]
    fn test_fetch_range_reverse() {
        let range = |a: &str, b: &str| {
            keys(cursor(true).fetch_range(a.as_bytes(), b.as_bytes()).unwrap())
        };
        assert_eq!(range("ee", "bb"), ["ee", "dd", "bbb", "bb"]);
        assert_eq!(range("cc", "a"), ["bbb", "bb", "aa"]);
        assert_eq!(range("zzzz", "foo"), ["zz", "gg"]);
        assert_eq!(range("ba", "eee"), ["ee", "dd", "bbb", "bb"]);
        assert!(range("zzzzz", "zzzz").is_empty());
        assert!(range("aA", "a").is_empty());
    }
}
