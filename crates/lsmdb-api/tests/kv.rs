// Key-value operations, lookups and range reads

mod common;

use common::{fill_k1_to_k9, pairs, strings, DbFixture};
use lsmdb::{Error, SeekMode};

fn k(i: usize) -> (String, String) {
    (format!("k{}", i), format!("v{}", i))
}

fn ks(range: impl IntoIterator<Item = usize>) -> Vec<(String, String)> {
    range.into_iter().map(k).collect()
}

#[test]
fn test_get_missing_key() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    assert_eq!(db.get(b"missing").unwrap(), None);
    assert!(!db.contains(b"missing").unwrap());
}

#[test]
fn test_overwrite_and_delete() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    db.insert(b"name", b"Alice").unwrap();
    db.insert(b"name", b"Bob").unwrap();
    assert_eq!(db.get(b"name").unwrap(), Some(b"Bob".to_vec()));

    db.delete(b"name").unwrap();
    assert_eq!(db.get(b"name").unwrap(), None);
    // Deleting a missing key is fine.
    db.delete(b"never-written").unwrap();
}

#[test]
fn test_empty_key_and_value() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    db.insert(b"", b"empty key").unwrap();
    db.insert(b"empty value", b"").unwrap();
    assert_eq!(db.get(b"").unwrap(), Some(b"empty key".to_vec()));
    assert_eq!(db.get(b"empty value").unwrap(), Some(Vec::new()));

    let first = db.iter().unwrap().next().unwrap().unwrap();
    assert_eq!(first.0, b"".to_vec());
}

#[test]
fn test_oversized_key_rejected() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    let key = vec![b'x'; lsmdb_core::validate::MAX_KEY_SIZE + 1];
    assert!(matches!(
        db.insert(&key, b"v"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(db.iter().unwrap().next().is_none());
}

#[test]
fn test_last_write_wins_across_segments() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    db.insert(b"a", b"1").unwrap();
    db.insert(b"b", b"1").unwrap();
    db.flush().unwrap();
    db.insert(b"a", b"2").unwrap();
    db.delete(b"b").unwrap();
    db.flush().unwrap();
    db.insert(b"a", b"3").unwrap();

    assert_eq!(db.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.get(b"b").unwrap(), None);
    assert_eq!(strings(db.iter().unwrap()), pairs(&[("a", "3")]));
}

#[test]
fn test_iterate_database() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    for i in 1..5 {
        db.insert(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes())
            .unwrap();
    }

    assert_eq!(strings(db.iter().unwrap()), ks(1..5));
    assert_eq!(strings(db.iter_rev().unwrap()), ks((1..5).rev()));

    let keys: Vec<Vec<u8>> = db.keys(true).unwrap().map(|k| k.unwrap()).collect();
    assert_eq!(keys.first(), Some(&b"k4".to_vec()));
    let values: Vec<Vec<u8>> = db.values(false).unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(values.len(), 4);
    assert_eq!(values[0], b"v1".to_vec());
}

#[test]
fn test_range_forward() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);

    let range = |a: Option<&str>, b: Option<&str>| {
        strings(
            db.range(a.map(str::as_bytes), b.map(str::as_bytes))
                .unwrap(),
        )
    };

    assert_eq!(range(Some("k2"), Some("k5")), ks(2..=5));
    assert_eq!(range(None, Some("k3")), ks(1..=3));
    assert_eq!(range(Some("k7"), None), ks(7..=9));
    assert_eq!(range(Some("k7"), Some("k88")), ks(7..=8));
    assert_eq!(range(Some("k33"), Some("k5")), ks(4..=5));
    assert!(range(Some("xx"), Some("yy")).is_empty());
    assert!(range(Some("xx"), None).is_empty());
    assert!(range(Some("aa"), Some("bb")).is_empty());
    assert!(range(None, Some("bb")).is_empty());
    assert_eq!(range(None, None), ks(1..=9));
}

#[test]
fn test_range_direction_inferred() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);

    assert_eq!(
        strings(db.range(Some(b"k7"), Some(b"k4")).unwrap()),
        ks([7, 6, 5, 4])
    );
    assert_eq!(
        strings(db.range(Some(b"k4"), Some(b"k7")).unwrap()),
        ks(4..=7)
    );
}

#[test]
fn test_range_reverse() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);

    let range = |a: Option<&str>, b: Option<&str>| {
        strings(
            db.range_reverse(a.map(str::as_bytes), b.map(str::as_bytes))
                .unwrap(),
        )
    };

    assert_eq!(range(Some("k5"), Some("k2")), ks([5, 4, 3, 2]));
    assert_eq!(range(Some("k2"), Some("k5")), ks([5, 4, 3, 2]));
    assert_eq!(range(Some("k7"), None), ks([9, 8, 7]));
    assert_eq!(range(None, Some("k3")), ks([3, 2, 1]));
    assert_eq!(range(Some("k88"), Some("k7")), ks([8, 7]));
    assert_eq!(range(Some("k5"), Some("k33")), ks([5, 4]));
    assert_eq!(range(None, Some("xx")), ks((1..=9).rev()));
    assert!(range(Some("yy"), Some("xx")).is_empty());
    assert!(range(Some("xx"), None).is_empty());
    assert!(range(Some("bb"), Some("aa")).is_empty());
    assert!(range(None, Some("bb")).is_empty());
    assert_eq!(range(None, None), ks((1..=9).rev()));
}

#[test]
fn test_delete_range_excludes_endpoints() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);

    db.delete_range(b"k3", b"k7").unwrap();
    assert_eq!(db.get(b"k3").unwrap(), Some(b"v3".to_vec()));
    assert_eq!(db.get(b"k7").unwrap(), Some(b"v7".to_vec()));
    for key in [b"k4", b"k5", b"k6"] {
        assert_eq!(db.get(key).unwrap(), None);
    }

    // Missing start key.
    db.delete_range(b"k4", b"k8").unwrap();
    assert_eq!(db.get(b"k8").unwrap(), Some(b"v8".to_vec()));
    assert_eq!(db.get(b"k7").unwrap(), None);

    // Start below every key.
    db.delete_range(b"k0", b"k2").unwrap();
    assert_eq!(db.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(db.get(b"k1").unwrap(), None);

    // End above every key.
    db.delete_range(b"k8", b"xx").unwrap();
    assert_eq!(db.get(b"k9").unwrap(), None);

    // Ranges outside the keyspace change nothing.
    db.delete_range(b"aa", b"bb").unwrap();
    db.delete_range(b"xx", b"yy").unwrap();
    // Reversed bounds are a no-op.
    db.delete_range(b"k8", b"k2").unwrap();

    assert_eq!(strings(db.iter().unwrap()), ks([2, 3, 8]));
}

#[test]
fn test_delete_range_reaches_segments() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);
    db.flush().unwrap();

    db.delete_range(b"k1", b"k9").unwrap();
    assert_eq!(strings(db.iter().unwrap()), ks([1, 9]));
}

#[test]
fn test_increment() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    assert_eq!(db.increment(b"i0").unwrap(), 1);
    assert_eq!(db.increment(b"i0").unwrap(), 2);
    assert_eq!(db.increment(b"i0").unwrap(), 3);
    assert_eq!(db.get(b"i0").unwrap(), Some(b"3".to_vec()));

    db.insert(b"neg", b"-5").unwrap();
    assert_eq!(db.increment(b"neg").unwrap(), -4);

    db.insert(b"text", b"ten").unwrap();
    let err = db.increment(b"text").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(db.get(b"text").unwrap(), Some(b"ten".to_vec()));
}

#[test]
fn test_update_bulk() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    db.update([("k1", "v1"), ("k2", "v2"), ("k3", "v3")]).unwrap();
    assert_eq!(strings(db.iter().unwrap()), ks(1..=3));

    // An invalid pair rejects the whole batch.
    let big = vec![b'x'; lsmdb_core::validate::MAX_KEY_SIZE + 1];
    let result = db.update(vec![(b"k4".to_vec(), b"v4".to_vec()), (big, b"v".to_vec())]);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert_eq!(db.get(b"k4").unwrap(), None);
}

#[test]
fn test_get_many() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    fill_k1_to_k9(&db);

    let found = db.get_many([&b"k1"[..], b"k5", b"nope"]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found.get(&b"k5".to_vec()), Some(&b"v5".to_vec()));
    assert!(!found.contains_key(&b"nope".to_vec()));
}

#[test]
fn test_get_nearest() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    for key in ["aa", "bb", "dd"] {
        db.insert(key.as_bytes(), key.as_bytes()).unwrap();
    }
    db.flush().unwrap();
    db.delete(b"bb").unwrap();

    let key = |mode, target: &str| {
        db.get_nearest(target.as_bytes(), mode)
            .unwrap()
            .map(|(k, _)| String::from_utf8(k).unwrap())
    };

    assert_eq!(key(SeekMode::Le, "cc"), Some("aa".to_string()));
    assert_eq!(key(SeekMode::Ge, "cc"), Some("dd".to_string()));
    assert_eq!(key(SeekMode::Ge, "ab"), Some("dd".to_string()));
    assert_eq!(key(SeekMode::Eq, "dd"), Some("dd".to_string()));
    assert_eq!(key(SeekMode::Eq, "bb"), None);
    assert_eq!(key(SeekMode::Le, "a"), None);
    assert_eq!(key(SeekMode::Ge, "e"), None);
}

#[test]
fn test_many_keys_through_flushes_and_merges() {
    let fixture = DbFixture::new();
    let mut config = DbFixture::config();
    config.autoflush_kb = 4;
    config.automerge = 2;
    let db = fixture.open_with(config);

    for i in 0..2000u32 {
        db.insert(format!("key{:05}", i).as_bytes(), &[b'v'; 64])
            .unwrap();
    }
    for i in (0..2000u32).step_by(2) {
        db.delete(format!("key{:05}", i).as_bytes()).unwrap();
    }

    let keys: Vec<Vec<u8>> = db.keys(false).unwrap().map(|k| k.unwrap()).collect();
    assert_eq!(keys.len(), 1000);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(keys[0], b"key00001".to_vec());

    let reversed: Vec<Vec<u8>> = db.keys(true).unwrap().map(|k| k.unwrap()).collect();
    assert_eq!(
        reversed,
        keys.iter().rev().cloned().collect::<Vec<_>>()
    );

    let stats = db.stats().unwrap();
    assert!(stats.flushes > 0);
    assert!(stats.merge_stats.merge_count > 0);
}
