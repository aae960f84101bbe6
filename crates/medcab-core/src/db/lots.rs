//! Lot database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Lot;

impl Database {
    /// Insert a new lot.
    pub fn insert_lot(&self, lot: &Lot) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO lots (lot_id, lot_code, source, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![lot.lot_id, lot.lot_code, lot.source, lot.notes, lot.created_at],
        )?;
        Ok(())
    }

    /// Get a lot by ID.
    pub fn get_lot(&self, lot_id: &str) -> DbResult<Option<Lot>> {
        self.conn
            .query_row(
                "SELECT lot_id, lot_code, source, notes, created_at FROM lots WHERE lot_id = ?",
                [lot_id],
                map_lot_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all lots, newest first.
    pub fn list_lots(&self) -> DbResult<Vec<Lot>> {
        let mut stmt = self.conn.prepare(
            "SELECT lot_id, lot_code, source, notes, created_at FROM lots ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], map_lot_row)?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(row?);
        }
        Ok(lots)
    }
}

fn map_lot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lot> {
    Ok(Lot {
        lot_id: row.get(0)?,
        lot_code: row.get(1)?,
        source: row.get(2)?,
        notes: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();

        let mut lot = Lot::new("AL".into());
        lot.source = Some("donation".into());
        db.insert_lot(&lot).unwrap();

        let fetched = db.get_lot(&lot.lot_id).unwrap().unwrap();
        assert_eq!(fetched, lot);

        let lots = db.list_lots().unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].lot_code, "AL");
    }
}
