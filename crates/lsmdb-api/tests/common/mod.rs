// Common test utilities for lsmdb integration tests

use lsmdb::{Config, Database};
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture owning a temporary directory for one database file
pub struct DbFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl DbFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("test.lsm");
        Self { temp_dir, path }
    }

    /// Small pages and blocks so tests reach flushes and merges quickly.
    /// Locking is off so a test can reopen a file it leaked a handle to.
    pub fn config() -> Config {
        Config {
            page_size: 1024,
            block_size_kb: 64,
            multiple_processes: false,
            ..Config::default()
        }
    }

    pub fn open(&self) -> Database {
        self.open_with(Self::config())
    }

    pub fn open_with(&self, config: Config) -> Database {
        Database::open_with_config(&self.path, config).expect("Failed to open database")
    }
}

impl Default for DbFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects `(key, value)` pairs as strings.
#[allow(dead_code)]
pub fn strings<I>(iter: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = lsmdb::Result<(Vec<u8>, Vec<u8>)>>,
{
    iter.into_iter()
        .map(|entry| {
            let (key, value) = entry.expect("Failed to read entry");
            (
                String::from_utf8(key).expect("key is not utf-8"),
                String::from_utf8(value).expect("value is not utf-8"),
            )
        })
        .collect()
}

/// Builds the expected output of [`strings`].
#[allow(dead_code)]
pub fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Writes `k1..k9` with values `v1..v9`.
#[allow(dead_code)]
pub fn fill_k1_to_k9(db: &Database) {
    for i in 1..10 {
        db.insert(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes())
            .expect("Failed to insert");
    }
}
