//! Memtable - In-memory sorted write buffer
//!
//! The Memtable holds recent writes before they are flushed to disk as a
//! segment. It uses a BTreeMap for sorted key order, which gives O(log n)
//! point operations and ordered range scans.
//!
//! The map sits behind an `Arc` and is cloned on write, so
//! [`Memtable::snapshot`] is O(1): a cursor keeps the map it saw while
//! writers continue on their own copy. The same type backs transaction
//! overlay frames.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Entry value in the memtable - can be a value or a tombstone (deletion marker)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemtableEntry {
    /// A live value
    Value(Vec<u8>),
    /// A tombstone marking deletion
    Tombstone,
}

impl MemtableEntry {
    /// Returns the size of this entry in bytes
    pub fn size(&self) -> usize {
        match self {
            MemtableEntry::Value(v) => v.len() + 1, // +1 for type tag
            MemtableEntry::Tombstone => 1,
        }
    }

    /// The live value, or `None` for a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            MemtableEntry::Value(v) => Some(v),
            MemtableEntry::Tombstone => None,
        }
    }

    /// Returns `true` for a tombstone
    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemtableEntry::Tombstone)
    }
}

/// Memtable - an in-memory sorted write buffer
#[derive(Debug, Clone, Default)]
pub struct Memtable {
    /// The underlying sorted map, shared with snapshots until written
    data: Arc<BTreeMap<Vec<u8>, MemtableEntry>>,
    /// Approximate size in bytes (for flush threshold checking)
    size_bytes: u64,
}

impl Memtable {
    /// Creates a new empty Memtable
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a key-value pair
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.insert(key, MemtableEntry::Value(value));
    }

    /// Marks a key as deleted with a tombstone
    pub fn delete(&mut self, key: Vec<u8>) {
        self.insert(key, MemtableEntry::Tombstone);
    }

    /// Stores `entry` under `key`, replacing any previous entry
    pub fn insert(&mut self, key: Vec<u8>, entry: MemtableEntry) {
        let key_size = key.len() as u64;
        let new_size = entry.size() as u64;
        let data = Arc::make_mut(&mut self.data);
        if let Some(old) = data.insert(key, entry) {
            self.size_bytes -= key_size + old.size() as u64;
        }
        self.size_bytes += key_size + new_size;
    }

    /// Retrieves a value by key
    ///
    /// Returns:
    /// - `Some(Some(value))` if the key exists with a value
    /// - `Some(None)` if the key was deleted (tombstone)
    /// - `None` if the key is not in the memtable
    pub fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.data.get(key).map(MemtableEntry::value)
    }

    /// Raw entry for `key`, tombstones included
    pub fn entry(&self, key: &[u8]) -> Option<&MemtableEntry> {
        self.data.get(key)
    }

    /// Folds every entry of `other` into this table; `other` wins.
    pub fn merge_from(&mut self, other: Memtable) {
        let entries = Arc::try_unwrap(other.data).unwrap_or_else(|shared| (*shared).clone());
        for (key, entry) in entries {
            self.insert(key, entry);
        }
    }

    /// Returns the approximate size of the memtable in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the number of entries in the memtable
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the memtable is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A read-only view that shares storage with this table until the
    /// table is next written
    pub fn snapshot(&self) -> Memtable {
        self.clone()
    }

    /// Returns an iterator over all entries in sorted order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Vec<u8>, &MemtableEntry)> {
        self.data.iter()
    }

    /// Returns an iterator over the entries between two bounds
    pub fn range<'a>(
        &'a self,
        lower: Bound<&'a [u8]>,
        upper: Bound<&'a [u8]>,
    ) -> impl DoubleEndedIterator<Item = (&'a Vec<u8>, &'a MemtableEntry)> {
        self.data.range::<[u8], _>((lower, upper))
    }

    /// Clears the memtable
    pub fn clear(&mut self) {
        self.data = Arc::new(BTreeMap::new());
        self.size_bytes = 0;
    }

    /// Consumes the memtable and returns all entries sorted by key
    pub fn into_entries(self) -> impl Iterator<Item = (Vec<u8>, MemtableEntry)> {
        Arc::try_unwrap(self.data)
            .unwrap_or_else(|shared| (*shared).clone())
            .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memtable_new() {
        let mt = Memtable::new();
        assert!(mt.is_empty());
        assert_eq!(mt.len(), 0);
        assert_eq!(mt.size_bytes(), 0);
    }

    #[test]
    fn test_memtable_put_get() {
        let mut mt = Memtable::new();

        mt.put(b"key1".to_vec(), b"value1".to_vec());
        mt.put(b"key2".to_vec(), b"value2".to_vec());

        assert_eq!(mt.len(), 2);
        assert_eq!(mt.get(b"key1"), Some(Some(b"value1".as_slice())));
        assert_eq!(mt.get(b"key2"), Some(Some(b"value2".as_slice())));
        assert_eq!(mt.get(b"key3"), None);
    }

    #[test]
    fn test_memtable_delete() {
        let mut mt = Memtable::new();

        mt.put(b"key".to_vec(), b"value".to_vec());
        mt.delete(b"key".to_vec());
        // Key exists but is a tombstone
        assert_eq!(mt.get(b"key"), Some(None));
        assert_eq!(mt.len(), 1);
    }

    #[test]
    fn test_memtable_size_tracking() {
        let mut mt = Memtable::new();

        mt.put(b"key".to_vec(), b"value".to_vec());
        assert_eq!(mt.size_bytes(), 3 + 6);

        mt.put(b"key".to_vec(), b"v".to_vec());
        assert_eq!(mt.size_bytes(), 3 + 2);

        mt.delete(b"key".to_vec());
        assert_eq!(mt.size_bytes(), 3 + 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_writes() {
        let mut mt = Memtable::new();
        mt.put(b"a".to_vec(), b"1".to_vec());

        let snap = mt.snapshot();
        mt.put(b"a".to_vec(), b"2".to_vec());
        mt.put(b"b".to_vec(), b"3".to_vec());

        assert_eq!(snap.get(b"a"), Some(Some(b"1".as_slice())));
        assert_eq!(snap.get(b"b"), None);
        assert_eq!(mt.len(), 2);
    }

    #[test]
    fn test_range_bounds() {
        let mut mt = Memtable::new();
        for k in ["a", "b", "c", "d"] {
            mt.put(k.as_bytes().to_vec(), k.as_bytes().to_vec());
        }

        let keys: Vec<_> = mt
            .range(Bound::Excluded(b"a".as_slice()), Bound::Included(b"c".as_slice()))
            .map(|(k, _)| k.clone())
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);

        let last_below = mt
            .range(Bound::Unbounded, Bound::Excluded(b"c".as_slice()))
            .next_back()
            .map(|(k, _)| k.clone());
        assert_eq!(last_below, Some(b"b".to_vec()));
    }

    #[test]
    fn test_merge_from_overrides() {
        let mut parent = Memtable::new();
        parent.put(b"k1".to_vec(), b"old".to_vec());
        parent.put(b"k2".to_vec(), b"keep".to_vec());

        let mut child = Memtable::new();
        child.put(b"k1".to_vec(), b"new".to_vec());
        child.delete(b"k3".to_vec());

        parent.merge_from(child);
        assert_eq!(parent.get(b"k1"), Some(Some(b"new".as_slice())));
        assert_eq!(parent.get(b"k2"), Some(Some(b"keep".as_slice())));
        assert_eq!(parent.get(b"k3"), Some(None));
    }

    #[test]
    fn test_memtable_iter_sorted() {
        let mut mt = Memtable::new();
        mt.put(b"c".to_vec(), b"3".to_vec());
        mt.put(b"a".to_vec(), b"1".to_vec());
        mt.put(b"b".to_vec(), b"2".to_vec());

        let keys: Vec<_> = mt.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_memtable_clear() {
        let mut mt = Memtable::new();
        mt.put(b"key1".to_vec(), b"value1".to_vec());
        mt.clear();
        assert!(mt.is_empty());
        assert_eq!(mt.size_bytes(), 0);
    }
}
