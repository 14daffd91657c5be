//! Transaction Demo
//!
//! Shows lsmdb's nested transactions:
//! - explicit begin / commit / rollback on the handle
//! - nested frames folding into their parent
//! - the scoped `Transaction` guard
//! - a bank transfer that either fully happens or not at all

use lsmdb::{Database, Error};

fn balance(db: &Database, account: &str) -> Result<i64, Error> {
    let raw = db.get(account.as_bytes())?.unwrap_or_default();
    String::from_utf8_lossy(&raw)
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{} is not a balance", account)))
}

fn transfer(db: &Database, from: &str, to: &str, amount: i64) -> Result<(), Error> {
    db.with_transaction(|db| {
        let source = balance(db, from)?;
        if source < amount {
            return Err(Error::InvalidArgument(format!(
                "insufficient funds in {}: {} < {}",
                from, source, amount
            )));
        }
        let target = balance(db, to)?;
        db.insert(from.as_bytes(), (source - amount).to_string().as_bytes())?;
        db.insert(to.as_bytes(), (target + amount).to_string().as_bytes())?;
        Ok(())
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== lsmdb Transaction Demo ===\n");

    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path().join("txn.lsm"))?;

    println!("1. Basic Transaction:");
    {
        db.begin()?;
        db.insert(b"user:alice", b"Alice Smith")?;
        db.insert(b"user:bob", b"Bob Jones")?;
        db.commit()?;
        println!("   Committed 2 users");

        let alice = db.get(b"user:alice")?.unwrap_or_default();
        println!("   Read back: {:?}", String::from_utf8_lossy(&alice));
    }

    println!("\n2. Rollback Demo:");
    {
        db.begin()?;
        db.insert(b"temp:data", b"temporary")?;
        println!("   Wrote temporary data, visible inside: {}", db.contains(b"temp:data")?);
        db.rollback(false)?;
        println!("   Rolled back transaction");

        let result = db.get(b"temp:data")?;
        println!("   Data after rollback: {:?}", result);
        assert!(result.is_none(), "Data should not exist after rollback");
    }

    println!("\n3. Nested Transactions:");
    {
        db.begin()?;
        db.insert(b"config:theme", b"dark")?;

        let depth = db.begin()?;
        db.insert(b"config:theme", b"light")?;
        db.insert(b"config:font", b"mono")?;
        println!("   Depth {}: theme = light, font = mono", depth);
        db.rollback(false)?;
        let theme = db.get(b"config:theme")?.map(String::from_utf8);
        println!("   Inner rolled back, theme = {:?}", theme);

        db.begin()?;
        db.insert(b"config:lang", b"en")?;
        db.commit()?;
        println!("   Inner committed into outer, depth now {}", db.transaction_depth()?);

        db.commit()?;
        assert_eq!(db.get(b"config:theme")?.as_deref(), Some(&b"dark"[..]));
        assert_eq!(db.get(b"config:font")?, None);
        assert_eq!(db.get(b"config:lang")?.as_deref(), Some(&b"en"[..]));
        println!("   Outer committed: theme = dark, lang = en, no font");
    }

    println!("\n4. Scoped Guard:");
    {
        {
            let mut txn = db.transaction()?;
            db.insert(b"draft:1", b"kept")?;
            txn.commit()?;
            db.insert(b"draft:2", b"discarded")?;
            // guard dropped here without finishing
        }
        println!("   draft:1 = {:?}", db.get(b"draft:1")?.map(String::from_utf8));
        println!("   draft:2 = {:?}", db.get(b"draft:2")?);
        assert!(db.get(b"draft:2")?.is_none());
    }

    println!("\n5. Bank Transfer:");
    {
        db.update([("account:alice", "1000"), ("account:bob", "500")])?;
        println!("   Initial: Alice=$1000, Bob=$500");

        transfer(&db, "account:alice", "account:bob", 200)?;
        println!(
            "   After $200 transfer: Alice=${}, Bob=${}",
            balance(&db, "account:alice")?,
            balance(&db, "account:bob")?
        );

        match transfer(&db, "account:bob", "account:alice", 5000) {
            Ok(()) => println!("   Unexpected: overdraft succeeded"),
            Err(e) => println!("   Refused: {}", e),
        }
        assert_eq!(balance(&db, "account:alice")?, 800);
        assert_eq!(balance(&db, "account:bob")?, 700);
        println!("   Balances unchanged after the refused transfer");
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
