//! Cursor Demo
//!
//! Walks an lsmdb file in both directions: seeking, stepping, and bounded
//! scans over data spread across the memory buffer and on-disk segments.
//!
//! Run with: cargo run -p lsmdb --example cursor_demo

use lsmdb::{Database, SeekMode};

fn show(label: &str, key: &[u8], value: &[u8]) {
    println!(
        "   {} {} = {}",
        label,
        String::from_utf8_lossy(key),
        String::from_utf8_lossy(value)
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== lsmdb Cursor Demo ===\n");

    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("cursor.lsm"))?;

    // Half the cities go to a segment, the rest stay in the buffer
    db.update([
        ("city:amsterdam", "NL"),
        ("city:berlin", "DE"),
        ("city:cairo", "EG"),
        ("city:delhi", "IN"),
    ])?;
    db.flush()?;
    db.update([
        ("city:edinburgh", "GB"),
        ("city:florence", "IT"),
        ("city:geneva", "CH"),
    ])?;

    println!("1. Forward scan:");
    for entry in db.iter()? {
        let (key, value) = entry?;
        show("", &key, &value);
    }

    println!("\n2. Reverse scan:");
    for key in db.keys(true)? {
        println!("   {}", String::from_utf8_lossy(&key?));
    }

    println!("\n3. Seeking:");
    {
        let mut cursor = db.cursor(false)?;
        cursor.seek(b"city:c", SeekMode::Ge)?;
        if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
            show("first >= city:c:", key, value);
        }
        cursor.seek(b"city:c", SeekMode::Le)?;
        if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
            show("last <= city:c:", key, value);
        }
        match cursor.seek(b"city:c", SeekMode::Eq) {
            Ok(()) => println!("   unexpected exact match"),
            Err(e) => println!("   exact seek for city:c: {}", e),
        }
    }

    println!("\n4. Stepping:");
    {
        let mut cursor = db.cursor(false)?;
        cursor.last()?;
        while cursor.is_valid() {
            if let Some(key) = cursor.key() {
                println!("   {}", String::from_utf8_lossy(key));
            }
            cursor.previous()?;
        }
    }

    println!("\n5. Bounded scans:");
    {
        let mut cursor = db.cursor(false)?;
        cursor.seek(b"city:b", SeekMode::Ge)?;
        let upto: Vec<String> = cursor
            .fetch_until(b"city:delhi")
            .keys()
            .map(|k| k.map(|k| String::from_utf8_lossy(&k).into_owned()))
            .collect::<Result<_, _>>()?;
        println!("   city:b..=city:delhi: {:?}", upto);

        let between: Vec<String> = db
            .cursor(true)?
            .fetch_range(b"city:cairo", b"city:florence")?
            .keys()
            .map(|k| k.map(|k| String::from_utf8_lossy(&k).into_owned()))
            .collect::<Result<_, _>>()?;
        println!("   reversed cairo..=florence: {:?}", between);
    }

    println!("\n6. Cursors see a fixed snapshot:");
    {
        let cursor = db.cursor(false)?;
        db.insert(b"city:helsinki", b"FI")?;
        db.delete(b"city:amsterdam")?;
        let seen = cursor.fetch_until(b"city:~").count();
        let now = db.iter()?.count();
        println!("   cursor opened before the writes saw {} cities, a new scan sees {}", seen, now);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
