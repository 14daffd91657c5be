//! Merge - folding neighbouring segments into one
//!
//! Merging bounds the number of segments a read has to consult. A merge
//! takes a contiguous window of segments, walks them with a k-way heap
//! merge and writes a single replacement segment holding the newest
//! version of every key.

use crate::segment::{Segment, SegmentEntry, SegmentIter, SegmentMeta, SegmentWriter};
use lsmdb_core::Result;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Statistics for merging
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    /// Number of merges performed
    pub merge_count: u64,
    /// Total entries read from input segments
    pub entries_read: u64,
    /// Total entries written to output segments
    pub entries_written: u64,
    /// Entries shadowed by a newer version of the same key
    pub entries_removed: u64,
    /// Tombstones dropped because no older data remained below them
    pub tombstones_dropped: u64,
}

/// Entry for merge iterator (with ordering)
#[derive(Debug)]
struct MergeEntry {
    entry: SegmentEntry,
    /// Position of the input, 0 being the newest
    source_idx: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.entry.key == other.entry.key && self.source_idx == other.source_idx
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: smallest key first, and for equal keys
        // the newest input (lowest source_idx) first.
        match other.entry.key.cmp(&self.entry.key) {
            Ordering::Equal => other.source_idx.cmp(&self.source_idx),
            ord => ord,
        }
    }
}

/// Chooses the window to merge from `segments` (newest first).
///
/// Returns `None` unless there are more than `automerge` segments. The
/// window is the `automerge` adjacent segments with the smallest total
/// size; ties go to the older window.
pub fn pick_window(segments: &[Arc<Segment>], automerge: usize) -> Option<Range<usize>> {
    if automerge <= 1 || segments.len() <= automerge {
        return None;
    }
    let mut best: Option<(u64, usize)> = None;
    for start in 0..=segments.len() - automerge {
        let size: u64 = segments[start..start + automerge]
            .iter()
            .map(|s| s.data_len())
            .sum();
        if best.is_none_or(|(best_size, _)| size <= best_size) {
            best = Some((size, start));
        }
    }
    best.map(|(_, start)| start..start + automerge)
}

fn push_next(
    heap: &mut BinaryHeap<MergeEntry>,
    iterators: &mut [SegmentIter],
    source_idx: usize,
    stats: &mut MergeStats,
) -> Result<()> {
    if let Some(entry) = iterators[source_idx].next_entry()? {
        stats.entries_read += 1;
        heap.push(MergeEntry { entry, source_idx });
    }
    Ok(())
}

/// Merges `inputs` (newest first) into `writer`.
///
/// With `drop_tombstones` set, deletions are left out of the output; only
/// valid when nothing older than the inputs remains. Returns `None` when
/// the output would be empty, in which case the writer's blocks are given
/// back.
pub fn merge_segments(
    inputs: &[Arc<Segment>],
    mut writer: SegmentWriter,
    drop_tombstones: bool,
    stats: &mut MergeStats,
) -> Result<Option<SegmentMeta>> {
    let mut iterators: Vec<SegmentIter> = inputs.iter().map(|s| s.iter()).collect();
    let mut heap: BinaryHeap<MergeEntry> = BinaryHeap::new();

    for idx in 0..iterators.len() {
        push_next(&mut heap, &mut iterators, idx, stats)?;
    }

    let mut last_key: Option<Vec<u8>> = None;
    while let Some(merge_entry) = heap.pop() {
        let source_idx = merge_entry.source_idx;

        if last_key.as_ref() == Some(&merge_entry.entry.key) {
            stats.entries_removed += 1;
        } else {
            last_key = Some(merge_entry.entry.key.clone());
            if drop_tombstones && merge_entry.entry.is_tombstone() {
                stats.tombstones_dropped += 1;
            } else {
                if let Err(e) = writer.add(merge_entry.entry) {
                    writer.abandon()?;
                    return Err(e);
                }
                stats.entries_written += 1;
            }
        }

        if let Err(e) = push_next(&mut heap, &mut iterators, source_idx, stats) {
            writer.abandon()?;
            return Err(e);
        }
    }

    stats.merge_count += 1;
    if writer.entry_count() == 0 {
        writer.abandon()?;
        debug!(inputs = inputs.len(), "Merge produced no entries");
        return Ok(None);
    }
    writer.finish().map(Some)
}
