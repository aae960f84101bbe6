//! Tamper-evident hash chain over the transaction log.
//!
//! Every transaction's `entry_hash` is `sha256(prev_hash || canonical
//! payload)`, with `prev_hash` the entry hash of the previous transaction
//! ("" for the first). Rewriting, reordering, or dropping any historical
//! entry breaks every hash after it, so an exported log can be verified
//! against the recorded tip.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::Transaction;

/// Audit chain errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chain broken at transaction {transaction_id}: {reason}")]
    ChainBroken {
        transaction_id: String,
        reason: String,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Current chain state.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    /// Entry hash of the newest transaction, if any exist
    pub tip_hash: Option<String>,
    /// Number of transactions in the chain
    pub length: u32,
}

/// Hash one chain entry: sha256 over the previous hash and the canonical
/// payload.
pub fn hash_entry(prev_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fill in a transaction's chain fields prior to insert.
pub fn seal(txn: &mut Transaction, prev_hash: &str) -> serde_json::Result<()> {
    let payload = txn.canonical_json()?;
    txn.prev_hash = prev_hash.to_string();
    txn.entry_hash = hash_entry(prev_hash, &payload);
    Ok(())
}

/// Walk the whole log in chain order, recomputing every hash.
///
/// Returns the chain stats when intact, or the first broken link.
pub fn verify_chain(db: &Database) -> AuditResult<ChainStats> {
    let chain = db.list_chain()?;

    let mut prev_hash = String::new();
    for txn in &chain {
        if txn.prev_hash != prev_hash {
            return Err(AuditError::ChainBroken {
                transaction_id: txn.transaction_id.clone(),
                reason: format!(
                    "prev_hash mismatch: expected {:?}, found {:?}",
                    prev_hash, txn.prev_hash
                ),
            });
        }

        let payload = txn.canonical_json()?;
        let expected = hash_entry(&txn.prev_hash, &payload);
        if txn.entry_hash != expected {
            return Err(AuditError::ChainBroken {
                transaction_id: txn.transaction_id.clone(),
                reason: "entry_hash does not match payload".into(),
            });
        }

        prev_hash = txn.entry_hash.clone();
    }

    Ok(ChainStats {
        tip_hash: chain.last().map(|t| t.entry_hash.clone()),
        length: chain.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Drug, InventoryUnit, TransactionKind};

    fn seed_unit(db: &Database) -> InventoryUnit {
        let drug = Drug::new("Amoxicillin".into(), 500.0, "mg".into());
        db.insert_drug(&drug).unwrap();
        let unit = InventoryUnit::new(drug.drug_id, 30.0, "2026-12-31".into());
        db.insert_unit(&unit).unwrap();
        unit
    }

    fn append(db: &Database, unit_id: &str, qty: f64) -> Transaction {
        let mut txn = Transaction::new(
            unit_id.into(),
            TransactionKind::CheckOut,
            qty,
            "nurse1".into(),
        );
        let prev = db.chain_tip().unwrap();
        seal(&mut txn, &prev).unwrap();
        db.insert_transaction(&txn).unwrap();
        txn
    }

    #[test]
    fn test_hash_entry_deterministic() {
        let a = hash_entry("", "payload");
        let b = hash_entry("", "payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // sha256 hex

        assert_ne!(hash_entry("", "payload"), hash_entry("x", "payload"));
        assert_ne!(hash_entry("", "payload"), hash_entry("", "other"));
    }

    #[test]
    fn test_empty_chain_verifies() {
        let db = Database::open_in_memory().unwrap();
        let stats = verify_chain(&db).unwrap();
        assert_eq!(stats.tip_hash, None);
        assert_eq!(stats.length, 0);
    }

    #[test]
    fn test_intact_chain_verifies() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);

        append(&db, &unit.unit_id, 1.0);
        append(&db, &unit.unit_id, 2.0);
        let last = append(&db, &unit.unit_id, 3.0);

        let stats = verify_chain(&db).unwrap();
        assert_eq!(stats.length, 3);
        assert_eq!(stats.tip_hash, Some(last.entry_hash));
    }

    #[test]
    fn test_broken_link_detected() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);
        append(&db, &unit.unit_id, 1.0);

        // Forge an entry that ignores the existing tip
        let mut forged = Transaction::new(
            unit.unit_id.clone(),
            TransactionKind::CheckOut,
            2.0,
            "nurse1".into(),
        );
        seal(&mut forged, "not-the-tip").unwrap();
        db.insert_transaction(&forged).unwrap();

        let err = verify_chain(&db).unwrap_err();
        match err {
            AuditError::ChainBroken { transaction_id, .. } => {
                assert_eq!(transaction_id, forged.transaction_id);
            }
            other => panic!("expected ChainBroken, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_entry_hash_detected() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);

        // Entry hash that doesn't match its own payload
        let mut txn = Transaction::new(
            unit.unit_id.clone(),
            TransactionKind::CheckOut,
            2.0,
            "nurse1".into(),
        );
        txn.prev_hash = String::new();
        txn.entry_hash = hash_entry("", "wrong payload");
        db.insert_transaction(&txn).unwrap();

        assert!(matches!(
            verify_chain(&db),
            Err(AuditError::ChainBroken { .. })
        ));
    }
}
