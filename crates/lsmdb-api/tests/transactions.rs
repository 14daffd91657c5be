// Nested transactions and scoped transaction guards

mod common;

use common::DbFixture;
use lsmdb::{Database, Error};

fn assert_missing(db: &Database, key: &[u8]) {
    assert_eq!(db.get(key).unwrap(), None, "{:?} should be missing", key);
}

fn assert_value(db: &Database, key: &[u8], value: &[u8]) {
    assert_eq!(db.get(key).unwrap(), Some(value.to_vec()));
}

#[test]
fn test_transaction_apis() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    db.begin().unwrap();
    db.insert(b"k1", b"v1").unwrap();
    assert!(db.rollback(true).unwrap());
    assert_eq!(db.transaction_depth().unwrap(), 1);
    assert_missing(&db, b"k1");

    db.insert(b"k2", b"v2").unwrap();
    assert!(db.rollback(false).unwrap());
    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_missing(&db, b"k2");

    // Nothing is open.
    assert!(!db.commit().unwrap());
    assert!(!db.rollback(false).unwrap());

    db.begin().unwrap();
    db.insert(b"k3", b"v3").unwrap();
    assert!(db.commit().unwrap());
    assert_value(&db, b"k3", b"v3");
}

#[test]
fn test_nested_rollback_restores_outer_state() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    db.insert(b"base", b"0").unwrap();

    assert_eq!(db.begin().unwrap(), 1);
    db.insert(b"x", b"1").unwrap();
    db.delete(b"base").unwrap();
    assert_eq!(db.begin().unwrap(), 2);
    db.insert(b"y", b"2").unwrap();
    db.insert(b"x", b"overwritten").unwrap();
    db.insert(b"base", b"back").unwrap();

    assert!(db.rollback(false).unwrap());
    assert_eq!(db.transaction_depth().unwrap(), 1);
    assert_value(&db, b"x", b"1");
    assert_missing(&db, b"y");
    assert_missing(&db, b"base");

    assert!(db.rollback(false).unwrap());
    assert_value(&db, b"base", b"0");
    assert_missing(&db, b"x");
}

#[test]
fn test_inner_commit_folds_into_parent() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    db.begin().unwrap();
    db.begin().unwrap();
    db.insert(b"inner", b"1").unwrap();
    assert!(db.commit().unwrap());
    assert_eq!(db.transaction_depth().unwrap(), 1);
    assert_value(&db, b"inner", b"1");

    // The outer rollback discards what the inner frame committed.
    assert!(db.rollback(false).unwrap());
    assert_missing(&db, b"inner");
}

#[test]
fn test_uncommitted_writes_stay_out_of_the_engine() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    db.begin().unwrap();
    db.insert(b"pending", b"1").unwrap();
    let cursor_keys: Vec<_> = db.keys(false).unwrap().map(|k| k.unwrap()).collect();
    assert_eq!(cursor_keys, vec![b"pending".to_vec()]);
    assert_eq!(db.stats().unwrap().memtable_entries, 0);

    db.commit().unwrap();
    assert_eq!(db.stats().unwrap().memtable_entries, 1);
}

#[test]
fn test_transaction_sees_engine_and_shadows_it() {
    let fixture = DbFixture::new();
    let db = fixture.open();
    db.insert(b"a", b"engine").unwrap();
    db.insert(b"b", b"engine").unwrap();
    db.flush().unwrap();

    db.begin().unwrap();
    db.delete(b"a").unwrap();
    db.insert(b"c", b"txn").unwrap();
    assert_eq!(
        db.keys(false)
            .unwrap()
            .map(|k| k.unwrap())
            .collect::<Vec<_>>(),
        vec![b"b".to_vec(), b"c".to_vec()]
    );
    assert_eq!(db.increment(b"n").unwrap(), 1);
    assert_eq!(db.increment(b"n").unwrap(), 2);

    db.rollback(false).unwrap();
    assert_value(&db, b"a", b"engine");
    assert_missing(&db, b"n");
}

#[test]
fn test_guard_commit_and_rollback_keep_frame() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    {
        let mut txn = db.transaction().unwrap();
        db.insert(b"k1", b"v1").unwrap();
        txn.commit().unwrap();
        assert_eq!(db.transaction_depth().unwrap(), 1);

        db.insert(b"k2", b"v2").unwrap();
        txn.rollback().unwrap();
        assert_eq!(db.transaction_depth().unwrap(), 1);

        db.insert(b"k3", b"v3").unwrap();
        txn.finish().unwrap();
    }

    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_value(&db, b"k1", b"v1");
    assert_missing(&db, b"k2");
    assert_value(&db, b"k3", b"v3");
}

#[test]
fn test_dropped_guard_rolls_back() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    fn write_then_fail(db: &Database, fail: bool) -> lsmdb::Result<()> {
        let txn = db.transaction()?;
        db.insert(b"partial", b"1")?;
        if fail {
            return Err(Error::InvalidArgument("bail out".into()));
        }
        txn.finish()
    }

    assert!(write_then_fail(&db, true).is_err());
    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_missing(&db, b"partial");

    write_then_fail(&db, false).unwrap();
    assert_value(&db, b"partial", b"1");
}

#[test]
fn test_guard_rolls_back_on_panic() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _txn = db.transaction().unwrap();
        db.insert(b"doomed", b"1").unwrap();
        panic!("boom");
    }));
    assert!(result.is_err());
    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_missing(&db, b"doomed");
}

#[test]
fn test_nested_guards() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    let outer = db.transaction().unwrap();
    db.insert(b"outer", b"1").unwrap();
    {
        let inner = db.transaction().unwrap();
        db.insert(b"inner", b"1").unwrap();
        inner.abort().unwrap();
    }
    {
        let inner = db.transaction().unwrap();
        db.insert(b"inner2", b"1").unwrap();
        inner.finish().unwrap();
    }
    outer.finish().unwrap();

    assert_value(&db, b"outer", b"1");
    assert_missing(&db, b"inner");
    assert_value(&db, b"inner2", b"1");
}

#[test]
fn test_outer_guard_misuse_while_inner_open() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    let mut outer = db.transaction().unwrap();
    db.begin().unwrap();
    let err = outer.commit().unwrap_err();
    assert!(matches!(err, Error::Misuse(_)));
    assert_eq!(err.code(), 21);

    assert!(db.rollback(false).unwrap());
    outer.commit().unwrap();
    outer.abort().unwrap();
    assert_eq!(db.transaction_depth().unwrap(), 0);
}

#[test]
fn test_with_transaction() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    let n = db
        .with_transaction(|db| {
            db.insert(b"a", b"1")?;
            db.insert(b"b", b"2")?;
            Ok(2)
        })
        .unwrap();
    assert_eq!(n, 2);
    assert_value(&db, b"b", b"2");

    let result: lsmdb::Result<()> = db.with_transaction(|db| {
        db.insert(b"c", b"3")?;
        Err(Error::InvalidArgument("nope".into()))
    });
    assert!(result.is_err());
    assert_missing(&db, b"c");
    assert_eq!(db.transaction_depth().unwrap(), 0);
}

#[test]
fn test_with_transaction_keeps_closure_error_over_open_inner_frame() {
    let fixture = DbFixture::new();
    let db = fixture.open();

    let result: lsmdb::Result<()> = db.with_transaction(|db| {
        db.begin()?;
        db.insert(b"inner", b"1")?;
        Err(Error::InvalidArgument("closure failed".into()))
    });

    match result {
        Err(Error::InvalidArgument(msg)) => assert_eq!(msg, "closure failed"),
        other => panic!("expected the closure's error, got {:?}", other),
    }
    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_missing(&db, b"inner");
}

#[test]
fn test_committed_transaction_is_durable() {
    let fixture = DbFixture::new();
    {
        let db = fixture.open();
        db.begin().unwrap();
        db.insert(b"a", b"1").unwrap();
        db.begin().unwrap();
        db.insert(b"b", b"2").unwrap();
        db.commit().unwrap();
        db.commit().unwrap();

        db.begin().unwrap();
        db.insert(b"uncommitted", b"x").unwrap();
        db.close().unwrap();
    }

    let db = fixture.open();
    assert_eq!(db.transaction_depth().unwrap(), 0);
    assert_value(&db, b"a", b"1");
    assert_value(&db, b"b", b"2");
    assert_missing(&db, b"uncommitted");
}
