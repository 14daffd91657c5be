// Common test utilities for WAL integration tests

use lsmdb_core::{BlockAllocator, Config, DbFile};
use lsmdb_wal::{RecoveredLog, RecoveryManager, WalConfig, WalManager, WalPosition};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test fixture owning a temporary database file with a small block size
pub struct WalTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl WalTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("wal.db");
        Self { temp_dir, path }
    }

    pub fn config() -> Config {
        Config {
            page_size: 1024,
            block_size_kb: 64,
            multiple_processes: false,
            ..Config::default()
        }
    }

    pub fn open_file(&self) -> Arc<DbFile> {
        Arc::new(DbFile::open(&self.path, &Self::config()).expect("Failed to open file"))
    }

    /// Creates a fresh log and returns it with its start position.
    pub fn create_log(&self, wal_config: WalConfig) -> (Arc<DbFile>, WalManager, WalPosition) {
        let file = self.open_file();
        let alloc = Arc::new(Mutex::new(BlockAllocator::new()));
        let manager =
            WalManager::create(file.clone(), alloc, wal_config).expect("Failed to create WAL");
        let start = manager.position();
        (file, manager, start)
    }

    /// Reopens the file and runs recovery from `start`.
    #[allow(dead_code)]
    pub fn recover(&self, start: WalPosition, min_lsn: u64) -> (Arc<DbFile>, RecoveredLog) {
        let file = self.open_file();
        let log = RecoveryManager::new(&file, start, min_lsn)
            .recover()
            .expect("Failed to recover");
        (file, log)
    }
}

impl Default for WalTestFixture {
    fn default() -> Self {
        Self::new()
    }
}
