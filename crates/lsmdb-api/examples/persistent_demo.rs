//! Demonstrates that lsmdb data survives closing and reopening the file.
//!
//! Run with: cargo run -p lsmdb --example persistent_demo

use lsmdb::Database;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = "./demo_database.lsm";

    println!("=== lsmdb Persistent Database Demo ===\n");

    // Clean up any previous demo data
    if Path::new(db_path).exists() {
        std::fs::remove_file(db_path)?;
        println!("Cleaned up previous demo data\n");
    }

    println!("PART 1: Writing data to database...");
    {
        let db = Database::open(db_path)?;

        // One logged group: all six keys or none
        db.update([
            ("user:1:name", "Alice"),
            ("user:1:email", "alice@example.com"),
            ("user:1:role", "admin"),
            ("user:2:name", "Bob"),
            ("user:2:email", "bob@example.com"),
            ("user:2:role", "user"),
        ])?;
        db.increment(b"stats:total_users")?;
        db.increment(b"stats:total_users")?;

        println!("   Stored 2 users and 1 counter");
        println!("   Data written to: {}", db_path);
    } // closing checkpoints the buffer into a segment
    println!("   Database closed\n");

    println!("PART 2: Reopening database and verifying data...");
    {
        let db = Database::open(db_path)?;

        for user in ["user:1", "user:2"] {
            let name = db.get(format!("{}:name", user).as_bytes())?.unwrap_or_default();
            let email = db.get(format!("{}:email", user).as_bytes())?.unwrap_or_default();
            println!(
                "   {}: {} <{}>",
                user,
                String::from_utf8_lossy(&name),
                String::from_utf8_lossy(&email)
            );
        }

        let count = db.get(b"stats:total_users")?.unwrap_or_default();
        println!("   Total users: {}", String::from_utf8_lossy(&count));
        println!("   Segments on disk: {}", db.stats()?.segment_count);
    }
    println!();

    println!("PART 3: Updating and deleting data...");
    {
        let db = Database::open(db_path)?;

        db.insert(b"user:1:role", b"superadmin")?;
        println!("   Updated Alice's role to 'superadmin'");

        db.delete(b"user:2:email")?;
        println!("   Deleted Bob's email");

        // Sync the log so the writes survive even without a clean close
        db.set_safety(lsmdb::Safety::Full)?;
        db.insert(b"stats:last_update", b"part3")?;
        println!("   Pending log bytes: {}", db.checkpoint_size()?);
    }
    println!();

    println!("PART 4: Final verification...");
    {
        let db = Database::open(db_path)?;

        let role = db.get(b"user:1:role")?;
        let bob_email = db.get(b"user:2:email")?;
        println!("   Alice's role: {:?}", role.as_deref().map(String::from_utf8_lossy));
        println!("   Bob's email: {:?}", bob_email);

        assert_eq!(role.as_deref(), Some(&b"superadmin"[..]));
        assert_eq!(bob_email, None);

        println!("   User keys:");
        for key in db.range(Some(&b"user:"[..]), Some(&b"user:~"[..]))?.keys() {
            println!("     {}", String::from_utf8_lossy(&key?));
        }

        println!("   All assertions passed!");
    }

    std::fs::remove_file(db_path)?;
    println!("\nCleaned up demo database");
    println!("\n=== Demo Complete! ===");

    Ok(())
}
