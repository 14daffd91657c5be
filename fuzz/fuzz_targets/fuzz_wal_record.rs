#![no_main]

use libfuzzer_sys::fuzz_target;
use lsmdb_wal::record::WalRecord;

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeout
    if data.len() > 1_000_000 {
        return;
    }

    // Decoding arbitrary bytes must never panic
    if let Ok((record, consumed)) = WalRecord::decode(data) {
        assert!(consumed <= data.len());
        let encoded = record.encode().expect("decoded record re-encodes");
        let (again, _) = WalRecord::decode(&encoded).expect("re-encoded record decodes");
        assert_eq!(again, record);
    }
});
