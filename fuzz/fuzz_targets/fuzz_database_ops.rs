#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lsmdb::{Config, Database};
use std::collections::BTreeMap;

#[derive(Arbitrary, Debug)]
enum DbOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Get { key: Vec<u8> },
    Delete { key: Vec<u8> },
    DeleteRange { start: Vec<u8>, end: Vec<u8> },
    Begin,
    Commit,
    Rollback { keep: bool },
    Flush,
    Checkpoint,
    Work,
    Reopen,
}

type Model = BTreeMap<Vec<u8>, Vec<u8>>;

fn open(path: &std::path::Path) -> Database {
    let config = Config {
        page_size: 512,
        block_size_kb: 64,
        autoflush_kb: 4,
        automerge: 2,
        multiple_processes: false,
        ..Config::default()
    };
    Database::open_with_config(path, config).expect("open")
}

fuzz_target!(|ops: Vec<DbOp>| {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fuzz.lsm");
    let mut db = open(&path);

    // Committed state first, one entry per open transaction after it
    let mut model: Vec<Model> = vec![Model::new()];

    for op in ops.iter().take(100) {
        match op {
            DbOp::Insert { key, value } => {
                if key.len() <= 256 && value.len() <= 1024 && db.insert(key, value).is_ok() {
                    model.last_mut().unwrap().insert(key.clone(), value.clone());
                }
            }
            DbOp::Get { key } => {
                if key.len() <= 256 {
                    let got = db.get(key).expect("get");
                    assert_eq!(got.as_ref(), model.last().unwrap().get(key));
                }
            }
            DbOp::Delete { key } => {
                if key.len() <= 256 && db.delete(key).is_ok() {
                    model.last_mut().unwrap().remove(key);
                }
            }
            DbOp::DeleteRange { start, end } => {
                // Both endpoints survive; start >= end deletes nothing
                if db.delete_range(start, end).is_ok() {
                    model
                        .last_mut()
                        .unwrap()
                        .retain(|k, _| k <= start || k >= end);
                }
            }
            DbOp::Begin => {
                db.begin().expect("begin");
                let top = model.last().unwrap().clone();
                model.push(top);
            }
            DbOp::Commit => {
                if db.commit().expect("commit") {
                    let top = model.pop().unwrap();
                    *model.last_mut().unwrap() = top;
                }
            }
            DbOp::Rollback { keep } => {
                if db.rollback(*keep).expect("rollback") {
                    model.pop();
                    if *keep {
                        let top = model.last().unwrap().clone();
                        model.push(top);
                    }
                }
            }
            DbOp::Flush => db.flush().expect("flush"),
            DbOp::Checkpoint => db.checkpoint().expect("checkpoint"),
            DbOp::Work => {
                db.work().expect("work");
            }
            DbOp::Reopen => {
                db.close().expect("close");
                drop(db);
                db = open(&path);
                model.truncate(1);
            }
        }
    }

    let scanned: Model = db
        .iter()
        .expect("iter")
        .collect::<Result<_, _>>()
        .expect("scan");
    assert_eq!(&scanned, model.last().unwrap());
});
