//! Stock intake and manual adjustment.
//!
//! Check-in and adjustment are single-unit atomic updates, not allocation:
//! they set quantities directly, under the same `0 <= available <= total`
//! invariant the schema enforces, and append hash-chained audit transactions
//! in the same SQLite transaction as the quantity change.

use thiserror::Error;

use crate::audit;
use crate::db::{transactions, units, Database, DbError};
use crate::models::{
    CheckInRequest, InventoryUnit, Transaction, TransactionKind,
};

/// Stock operation errors.
#[derive(Error, Debug)]
pub enum StockError {
    /// Rejected before any write: bad quantities, bad dates, missing fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Internal(#[from] DbError),
}

pub type StockResult<T> = Result<T, StockError>;

/// Result of a committed check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInReceipt {
    /// Units created, each fully available
    pub units: Vec<InventoryUnit>,
    /// IDs of the check_in transactions, one per unit
    pub transaction_ids: Vec<String>,
}

/// Result of a committed adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustReceipt {
    /// The unit after the adjustment
    pub unit: InventoryUnit,
    /// ID of the adjust transaction
    pub transaction_id: String,
}

/// Check-in and adjustment operations.
pub struct StockService<'a> {
    db: &'a mut Database,
}

impl<'a> StockService<'a> {
    /// Create a new stock service.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Batch check-in: create `unit_count` identical units of one drug, each
    /// with `available == total`, plus one check_in transaction per unit.
    ///
    /// Unit and transaction rows commit together or not at all. The drug row
    /// is found or created up front (reusing an existing NDC or profile
    /// match), as is the lot lookup.
    pub fn check_in(&mut self, req: &CheckInRequest) -> StockResult<CheckInReceipt> {
        req.validate().map_err(StockError::InvalidRequest)?;

        if let Some(lot_id) = &req.lot_id {
            if self.db.get_lot(lot_id)?.is_none() {
                return Err(StockError::NotFound(format!("lot {}", lot_id)));
            }
        }

        let (drug, _) = self.db.find_or_create_drug(
            req.ndc_id.as_deref(),
            &req.medication_name,
            req.strength,
            req.strength_unit.as_str(),
            req.form.as_deref(),
        )?;

        let tx = self.db.transaction()?;
        let mut prev_hash = transactions::chain_tip(&tx)?;
        let mut created_units = Vec::with_capacity(req.unit_count as usize);
        let mut transaction_ids = Vec::with_capacity(req.unit_count as usize);

        for _ in 0..req.unit_count {
            let mut unit = InventoryUnit::new(
                drug.drug_id.clone(),
                req.quantity_per_unit,
                req.expiry_date.clone(),
            );
            unit.lot_id = req.lot_id.clone();
            unit.notes = req.notes.clone();
            units::insert_unit(&tx, &unit)?;

            let mut txn = Transaction::new(
                unit.unit_id.clone(),
                TransactionKind::CheckIn,
                req.quantity_per_unit,
                req.performed_by.clone(),
            );
            txn.notes = req.notes.clone();
            audit::seal(&mut txn, &prev_hash).map_err(DbError::Json)?;
            transactions::insert_transaction(&tx, &txn)?;

            prev_hash = txn.entry_hash.clone();
            transaction_ids.push(txn.transaction_id);
            created_units.push(unit);
        }

        tx.commit().map_err(DbError::Sqlite)?;

        Ok(CheckInReceipt {
            units: created_units,
            transaction_ids,
        })
    }

    /// Manual correction of a unit's quantities.
    ///
    /// Rejects any edit that would violate `0 <= available <= total` before
    /// touching the row. The adjust transaction records the signed change in
    /// available quantity.
    pub fn adjust_unit(
        &mut self,
        unit_id: &str,
        new_total: f64,
        new_available: f64,
        performed_by: &str,
        notes: Option<&str>,
    ) -> StockResult<AdjustReceipt> {
        if !new_total.is_finite() || !new_available.is_finite() {
            return Err(StockError::InvalidRequest(
                "quantities must be finite numbers".into(),
            ));
        }
        if new_available < 0.0 || new_total < 0.0 || new_available > new_total {
            return Err(StockError::InvalidRequest(format!(
                "quantities must satisfy 0 <= available <= total, got available={} total={}",
                new_available, new_total
            )));
        }

        let unit = self
            .db
            .get_unit(unit_id)?
            .ok_or_else(|| StockError::NotFound(format!("unit {}", unit_id)))?;

        let delta = new_available - unit.available_quantity;

        let tx = self.db.transaction()?;
        units::set_quantities(&tx, unit_id, new_total, new_available)?;

        let prev_hash = transactions::chain_tip(&tx)?;
        let mut txn = Transaction::new(
            unit_id.to_string(),
            TransactionKind::Adjust,
            delta,
            performed_by.to_string(),
        );
        txn.notes = notes.map(str::to_string);
        audit::seal(&mut txn, &prev_hash).map_err(DbError::Json)?;
        transactions::insert_transaction(&tx, &txn)?;
        let transaction_id = txn.transaction_id;

        tx.commit().map_err(DbError::Sqlite)?;

        let unit = self
            .db
            .get_unit(unit_id)?
            .ok_or_else(|| StockError::NotFound(format!("unit {}", unit_id)))?;
        Ok(AdjustReceipt {
            unit,
            transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lot;

    fn request() -> CheckInRequest {
        CheckInRequest {
            ndc_id: Some("0781-1506-10".into()),
            medication_name: "Amoxicillin".into(),
            strength: 500.0,
            strength_unit: "mg".into(),
            form: Some("capsule".into()),
            lot_id: None,
            quantity_per_unit: 30.0,
            unit_count: 3,
            expiry_date: "2026-12-31".into(),
            performed_by: "tech1".into(),
            notes: None,
        }
    }

    #[test]
    fn test_check_in_creates_units_and_log() {
        let mut db = Database::open_in_memory().unwrap();
        let receipt = StockService::new(&mut db).check_in(&request()).unwrap();

        assert_eq!(receipt.units.len(), 3);
        assert_eq!(receipt.transaction_ids.len(), 3);
        for unit in &receipt.units {
            let fetched = db.get_unit(&unit.unit_id).unwrap().unwrap();
            assert_eq!(fetched.total_quantity, 30.0);
            assert_eq!(fetched.available_quantity, 30.0);
        }

        let chain = db.list_chain().unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|t| t.kind == TransactionKind::CheckIn));
        assert!(crate::audit::verify_chain(&db).is_ok());
    }

    #[test]
    fn test_check_in_reuses_drug() {
        let mut db = Database::open_in_memory().unwrap();
        let first = StockService::new(&mut db).check_in(&request()).unwrap();
        let second = StockService::new(&mut db).check_in(&request()).unwrap();
        assert_eq!(first.units[0].drug_id, second.units[0].drug_id);
    }

    #[test]
    fn test_check_in_unknown_lot() {
        let mut db = Database::open_in_memory().unwrap();
        let mut req = request();
        req.lot_id = Some("missing".into());
        let err = StockService::new(&mut db).check_in(&req).unwrap_err();
        assert!(matches!(err, StockError::NotFound(_)));
    }

    #[test]
    fn test_check_in_with_lot() {
        let mut db = Database::open_in_memory().unwrap();
        let lot = Lot::new("AL".into());
        db.insert_lot(&lot).unwrap();

        let mut req = request();
        req.lot_id = Some(lot.lot_id.clone());
        let receipt = StockService::new(&mut db).check_in(&req).unwrap();
        assert_eq!(receipt.units[0].lot_id.as_deref(), Some(lot.lot_id.as_str()));

        let detail = db.get_unit_detail(&receipt.units[0].unit_id).unwrap().unwrap();
        assert_eq!(detail.lot_code.as_deref(), Some("AL"));
    }

    #[test]
    fn test_check_in_rejects_bad_request() {
        let mut db = Database::open_in_memory().unwrap();

        let mut req = request();
        req.quantity_per_unit = -1.0;
        assert!(matches!(
            StockService::new(&mut db).check_in(&req),
            Err(StockError::InvalidRequest(_))
        ));

        let mut req = request();
        req.unit_count = 0;
        assert!(matches!(
            StockService::new(&mut db).check_in(&req),
            Err(StockError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_adjust_unit() {
        let mut db = Database::open_in_memory().unwrap();
        let receipt = StockService::new(&mut db).check_in(&request()).unwrap();
        let unit_id = receipt.units[0].unit_id.clone();

        let adjusted = StockService::new(&mut db)
            .adjust_unit(&unit_id, 28.0, 25.0, "admin1", Some("recount"))
            .unwrap();
        assert_eq!(adjusted.unit.total_quantity, 28.0);
        assert_eq!(adjusted.unit.available_quantity, 25.0);

        let txn = db.get_transaction(&adjusted.transaction_id).unwrap().unwrap();
        assert_eq!(txn.kind, TransactionKind::Adjust);
        assert_eq!(txn.quantity, -5.0); // signed available-delta
        assert!(crate::audit::verify_chain(&db).is_ok());
    }

    #[test]
    fn test_adjust_rejects_invariant_violations() {
        let mut db = Database::open_in_memory().unwrap();
        let receipt = StockService::new(&mut db).check_in(&request()).unwrap();
        let unit_id = receipt.units[0].unit_id.clone();

        // available > total
        assert!(matches!(
            StockService::new(&mut db).adjust_unit(&unit_id, 10.0, 11.0, "admin1", None),
            Err(StockError::InvalidRequest(_))
        ));
        // negative
        assert!(matches!(
            StockService::new(&mut db).adjust_unit(&unit_id, 10.0, -1.0, "admin1", None),
            Err(StockError::InvalidRequest(_))
        ));

        // Rejected edits leave no trace
        let unit = db.get_unit(&unit_id).unwrap().unwrap();
        assert_eq!(unit.available_quantity, 30.0);
        assert_eq!(db.list_chain().unwrap().len(), 3);
    }

    #[test]
    fn test_adjust_missing_unit() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(matches!(
            StockService::new(&mut db).adjust_unit("missing", 1.0, 1.0, "admin1", None),
            Err(StockError::NotFound(_))
        ));
    }
}
