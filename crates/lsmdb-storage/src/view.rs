//! Merged read view
//!
//! Readers see transaction overlays, the memtable, frozen memtables and
//! segments as one ordered map. Each layer is a [`SortedSource`]; the view
//! asks every source for its candidate and keeps the one from the
//! highest-priority source, skipping keys whose winning entry is a
//! tombstone.

use crate::memtable::{Memtable, MemtableEntry};
use lsmdb_core::Result;
use std::ops::Bound;

/// Where to position a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seek<'a> {
    First,
    Last,
    /// Least key >= the given key
    Ge(&'a [u8]),
    /// Least key > the given key
    Gt(&'a [u8]),
    /// Greatest key <= the given key
    Le(&'a [u8]),
    /// Greatest key < the given key
    Lt(&'a [u8]),
}

impl Seek<'_> {
    /// Whether the seek looks for the smallest qualifying key.
    pub fn is_forward(&self) -> bool {
        matches!(self, Seek::First | Seek::Ge(_) | Seek::Gt(_))
    }
}

/// An ordered layer of the database. Tombstones are reported, not hidden.
pub trait SortedSource: Send {
    fn seek(&mut self, seek: Seek<'_>) -> Result<Option<(Vec<u8>, MemtableEntry)>>;
}

impl SortedSource for Memtable {
    fn seek(&mut self, seek: Seek<'_>) -> Result<Option<(Vec<u8>, MemtableEntry)>> {
        let found = match seek {
            Seek::First => self.iter().next(),
            Seek::Last => self.iter().next_back(),
            Seek::Ge(key) => self.range(Bound::Included(key), Bound::Unbounded).next(),
            Seek::Gt(key) => self.range(Bound::Excluded(key), Bound::Unbounded).next(),
            Seek::Le(key) => self.range(Bound::Unbounded, Bound::Included(key)).next_back(),
            Seek::Lt(key) => self.range(Bound::Unbounded, Bound::Excluded(key)).next_back(),
        };
        Ok(found.map(|(k, e)| (k.clone(), e.clone())))
    }
}

/// Several sources read as one. Sources are given in priority order: the
/// first source shadows all later ones.
pub struct MergedView {
    sources: Vec<Box<dyn SortedSource>>,
}

impl MergedView {
    pub fn new(sources: Vec<Box<dyn SortedSource>>) -> Self {
        Self { sources }
    }

    /// Number of layers in the view
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Positions on the live entry `seek` selects.
    pub fn seek(&mut self, seek: Seek<'_>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let forward = seek.is_forward();
        let mut target = self.locate(seek)?;
        loop {
            match target {
                None => return Ok(None),
                Some((key, MemtableEntry::Value(value))) => return Ok(Some((key, value))),
                Some((key, MemtableEntry::Tombstone)) => {
                    let next = if forward {
                        Seek::Gt(&key)
                    } else {
                        Seek::Lt(&key)
                    };
                    target = self.locate(next)?;
                }
            }
        }
    }

    /// The winning entry across all sources, tombstones included.
    fn locate(&mut self, seek: Seek<'_>) -> Result<Option<(Vec<u8>, MemtableEntry)>> {
        let forward = seek.is_forward();
        let mut best: Option<(Vec<u8>, MemtableEntry)> = None;
        for source in self.sources.iter_mut() {
            let Some((key, entry)) = source.seek(seek)? else {
                continue;
            };
            let better = match &best {
                None => true,
                // Equal keys keep the earlier, higher-priority source.
                Some((best_key, _)) if forward => key < *best_key,
                Some((best_key, _)) => key > *best_key,
            };
            if better {
                best = Some((key, entry));
            }
        }
        Ok(best)
    }
}
