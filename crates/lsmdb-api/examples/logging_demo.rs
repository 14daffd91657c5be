use lsmdb::logging::LogConfig;
use lsmdb::Database;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Flushes, merges and recovery are logged at debug level
    let _guard = LogConfig::debug().init()?;

    println!("=== lsmdb Logging Demo ===\n");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("logging.lsm");

    // Logs "Opening database"
    let db = Database::open(&path)?;

    println!("\n1. Inserting data...");
    db.insert(b"user:1", b"Alice")?;
    db.insert(b"user:2", b"Bob")?;
    db.insert(b"user:3", b"Charlie")?;

    println!("\n2. Reading data...");
    if let Some(value) = db.get(b"user:1")? {
        println!("Found: {}", String::from_utf8_lossy(&value));
    }

    println!("\n3. Deleting data...");
    db.delete(b"user:2")?;

    println!("\n4. Flushing and checkpointing...");
    db.flush()?;
    db.checkpoint()?;

    println!("\n5. Committing a transaction...");
    db.with_transaction(|db| db.insert(b"txn:key", b"txn:value"))?;

    println!("\n6. Closing and reopening (replays the log)...");
    db.insert(b"unflushed", b"value")?;
    drop(db);
    let db = Database::open(&path)?;
    println!("Recovered: {:?}", db.get(b"unflushed")?.map(String::from_utf8));

    println!("\n=== Demo Complete ===");
    println!("Check the logs above to see tracing output!");

    Ok(())
}
