#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lsmdb::{Config, Database, Error, SeekMode};
use std::collections::BTreeMap;

#[derive(Arbitrary, Debug)]
struct Input {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    flush_every: u8,
    seek: Vec<u8>,
    ge: bool,
    reverse: bool,
}

fuzz_target!(|input: Input| {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        page_size: 512,
        block_size_kb: 64,
        multiple_processes: false,
        ..Config::default()
    };
    let db = Database::open_with_config(dir.path().join("fuzz.lsm"), config).expect("open");

    let mut model = BTreeMap::new();
    for (i, (key, value)) in input.entries.iter().take(200).enumerate() {
        if key.len() > 256 || value.len() > 256 {
            continue;
        }
        db.insert(key, value).expect("insert");
        model.insert(key.clone(), value.clone());
        if input.flush_every > 0 && i % input.flush_every as usize == 0 {
            db.flush().expect("flush");
        }
    }

    // Step away from the seek point: forward from Ge, backward from Le
    let (mode, expected): (_, Vec<_>) = if input.ge {
        (SeekMode::Ge, model.range(input.seek.clone()..).collect())
    } else {
        (SeekMode::Le, model.range(..=input.seek.clone()).rev().collect())
    };
    let mut cursor = db.cursor(input.reverse).expect("cursor");
    match cursor.seek(&input.seek, mode) {
        Ok(()) => {}
        Err(Error::NotFound) => {
            assert!(expected.is_empty());
            return;
        }
        Err(e) => panic!("seek failed: {}", e),
    }
    let mut walked = Vec::new();
    while let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
        walked.push((key.to_vec(), value.to_vec()));
        if input.ge {
            cursor.next().expect("next");
        } else {
            cursor.previous().expect("previous");
        }
    }
    assert!(cursor.is_exhausted());
    let expected: Vec<_> = expected.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    assert_eq!(walked, expected);

    // Full iteration in the cursor's own direction
    let mut cursor = db.cursor(input.reverse).expect("cursor");
    let scanned: Vec<_> = cursor.entries().collect::<Result<_, _>>().expect("scan");
    let mut all: Vec<_> = model.into_iter().collect();
    if input.reverse {
        all.reverse();
    }
    assert_eq!(scanned, all);
});
