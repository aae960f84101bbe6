//! Transaction log database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Transaction, TransactionKind};

impl Database {
    /// Append a transaction to the log. The hash chain fields must already be
    /// filled in (see [`crate::audit`]).
    pub fn insert_transaction(&self, txn: &Transaction) -> DbResult<()> {
        insert_transaction(&self.conn, txn)
    }

    /// Entry hash of the newest transaction, or "" for an empty log.
    pub fn chain_tip(&self) -> DbResult<String> {
        chain_tip(&self.conn)
    }

    /// Get a transaction by ID.
    pub fn get_transaction(&self, transaction_id: &str) -> DbResult<Option<Transaction>> {
        self.conn
            .query_row(
                &format!("{} WHERE transaction_id = ?", SELECT_TRANSACTION),
                [transaction_id],
                map_transaction_row,
            )
            .optional()?
            .transpose()
    }

    /// Most recent transactions first (activity log view).
    pub fn list_transactions(&self, limit: usize) -> DbResult<Vec<Transaction>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY seq DESC LIMIT ?", SELECT_TRANSACTION))?;
        let rows = stmt.query_map([limit as i64], map_transaction_row)?;
        collect_rows(rows)
    }

    /// All transactions for one unit, most recent first.
    pub fn transactions_for_unit(&self, unit_id: &str) -> DbResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE unit_id = ? ORDER BY seq DESC",
            SELECT_TRANSACTION
        ))?;
        let rows = stmt.query_map([unit_id], map_transaction_row)?;
        collect_rows(rows)
    }

    /// The full log in chain order (oldest first), for audit verification.
    pub fn list_chain(&self) -> DbResult<Vec<Transaction>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY seq", SELECT_TRANSACTION))?;
        let rows = stmt.query_map([], map_transaction_row)?;
        collect_rows(rows)
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT transaction_id, unit_id, kind, quantity, performed_by,
           patient_ref, notes, prev_hash, entry_hash, created_at
    FROM transactions
"#;

/// Append a transaction through any connection (plain or mid-transaction).
pub(crate) fn insert_transaction(conn: &Connection, txn: &Transaction) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO transactions (
            transaction_id, unit_id, kind, quantity, performed_by,
            patient_ref, notes, prev_hash, entry_hash, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            txn.transaction_id,
            txn.unit_id,
            txn.kind.as_str(),
            txn.quantity,
            txn.performed_by,
            txn.patient_ref,
            txn.notes,
            txn.prev_hash,
            txn.entry_hash,
            txn.created_at,
        ],
    )?;
    Ok(())
}

/// Chain tip through any connection (plain or mid-transaction).
pub(crate) fn chain_tip(conn: &Connection) -> DbResult<String> {
    let tip: Option<String> = conn
        .query_row(
            "SELECT entry_hash FROM transactions ORDER BY seq DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tip.unwrap_or_default())
}

fn map_transaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbResult<Transaction>> {
    let kind_str: String = row.get(2)?;
    let kind = match TransactionKind::parse(&kind_str) {
        Some(kind) => kind,
        None => {
            return Ok(Err(DbError::Constraint(format!(
                "unknown transaction kind {:?}",
                kind_str
            ))))
        }
    };
    Ok(Ok(Transaction {
        transaction_id: row.get(0)?,
        unit_id: row.get(1)?,
        kind,
        quantity: row.get(3)?,
        performed_by: row.get(4)?,
        patient_ref: row.get(5)?,
        notes: row.get(6)?,
        prev_hash: row.get(7)?,
        entry_hash: row.get(8)?,
        created_at: row.get(9)?,
    }))
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<DbResult<Transaction>>>,
) -> DbResult<Vec<Transaction>> {
    let mut txns = Vec::new();
    for row in rows {
        txns.push(row??);
    }
    Ok(txns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Drug, InventoryUnit};

    fn seed_unit(db: &Database) -> InventoryUnit {
        let drug = Drug::new("Amoxicillin".into(), 500.0, "mg".into());
        db.insert_drug(&drug).unwrap();
        let unit = InventoryUnit::new(drug.drug_id, 30.0, "2026-12-31".into());
        db.insert_unit(&unit).unwrap();
        unit
    }

    fn txn(unit_id: &str, entry_hash: &str, prev_hash: &str) -> Transaction {
        let mut txn = Transaction::new(
            unit_id.into(),
            TransactionKind::CheckOut,
            3.0,
            "nurse1".into(),
        );
        txn.prev_hash = prev_hash.into();
        txn.entry_hash = entry_hash.into();
        txn
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);

        let expected = txn(&unit.unit_id, "h1", "");
        db.insert_transaction(&expected).unwrap();

        let fetched = db
            .get_transaction(&expected.transaction_id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched, expected);
    }

    #[test]
    fn test_chain_tip_tracks_latest() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);

        assert_eq!(db.chain_tip().unwrap(), "");

        db.insert_transaction(&txn(&unit.unit_id, "h1", "")).unwrap();
        assert_eq!(db.chain_tip().unwrap(), "h1");

        db.insert_transaction(&txn(&unit.unit_id, "h2", "h1")).unwrap();
        assert_eq!(db.chain_tip().unwrap(), "h2");
    }

    #[test]
    fn test_list_ordering() {
        let db = Database::open_in_memory().unwrap();
        let unit = seed_unit(&db);

        db.insert_transaction(&txn(&unit.unit_id, "h1", "")).unwrap();
        db.insert_transaction(&txn(&unit.unit_id, "h2", "h1")).unwrap();

        // Log views are newest first
        let listed = db.list_transactions(10).unwrap();
        assert_eq!(listed[0].entry_hash, "h2");
        assert_eq!(listed[1].entry_hash, "h1");

        // Chain order is oldest first
        let chain = db.list_chain().unwrap();
        assert_eq!(chain[0].entry_hash, "h1");
        assert_eq!(chain[1].entry_hash, "h2");

        let for_unit = db.transactions_for_unit(&unit.unit_id).unwrap();
        assert_eq!(for_unit.len(), 2);
        assert!(db.transactions_for_unit("missing").unwrap().is_empty());
    }
}
