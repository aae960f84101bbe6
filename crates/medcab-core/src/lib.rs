//! MedCab Core Library
//!
//! Local-first medication inventory core with FEFO checkout allocation.
//!
//! # Architecture
//!
//! ```text
//! Scan/Search → Unit lookup                Check-In → units created
//!                    │                          (available == total)
//!          Checkout request
//!                    │
//!       ┌────────────▼────────────┐
//!       │    Candidate Selection  │  NDC match, or name+strength+unit
//!       │   (available > 0 only)  │  fallback; expired stock included
//!       └────────────┬────────────┘
//!       ┌────────────▼────────────┐
//!       │      FEFO Planner       │  pure: earliest expiry first,
//!       │                         │  check-in order on ties
//!       └────────────┬────────────┘
//!       ┌────────────▼────────────┐
//!       │      Atomic Commit      │  conditional decrements + one
//!       │  (one SQLite txn, all   │  hash-chained check_out record
//!       │   entries or none)      │  per unit touched
//!       └─────────────────────────┘
//! ```
//!
//! # Core Principle
//!
//! **A checkout either fully satisfies the request or changes nothing.**
//! Partial dispensing is never silently accepted; insufficiency reports the
//! maximum fulfillable quantity so the caller can offer a reduced retry, and
//! a commit that loses a race reports a conflict instead of overdrawing.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 search
//! - [`models`]: Domain types (Drug, InventoryUnit, Transaction, etc.)
//! - [`allocator`]: FEFO planner and atomic checkout commit
//! - [`stock`]: Check-in and manual adjustment
//! - [`audit`]: Tamper-evident hash chain over the transaction log

pub mod allocator;
pub mod audit;
pub mod db;
pub mod models;
pub mod stock;

// Re-export commonly used types
pub use allocator::{plan, plan_single, AllocationError, CheckoutEngine};
pub use audit::{verify_chain, AuditError, ChainStats};
pub use db::{DashboardStats, Database};
pub use models::{
    AllocationPlan, CandidateUnit, CheckInRequest, CheckoutSummary, Drug, DrugKey, InventoryUnit,
    Lot, PlanEntry, Transaction, TransactionKind, UnitDetail,
};
pub use stock::{AdjustReceipt, CheckInReceipt, StockError, StockService};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedCabError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{message}")]
    InsufficientStock { message: String, max_fulfillable: f64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for MedCabError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => MedCabError::NotFound(what),
            other => MedCabError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AllocationError> for MedCabError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::InvalidRequest(msg) => MedCabError::InvalidRequest(msg),
            AllocationError::NotFound(what) => MedCabError::NotFound(what),
            AllocationError::InsufficientStock {
                requested,
                max_fulfillable,
            } => MedCabError::InsufficientStock {
                message: format!(
                    "requested {}, only {} available",
                    requested, max_fulfillable
                ),
                max_fulfillable,
            },
            AllocationError::CommitConflict(msg) => MedCabError::Conflict(msg),
            AllocationError::Internal(db) => db.into(),
        }
    }
}

impl From<StockError> for MedCabError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::InvalidRequest(msg) => MedCabError::InvalidRequest(msg),
            StockError::NotFound(what) => MedCabError::NotFound(what),
            StockError::Internal(db) => db.into(),
        }
    }
}

impl From<AuditError> for MedCabError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::Database(db) => db.into(),
            AuditError::Json(json) => MedCabError::SerializationError(json.to_string()),
            broken @ AuditError::ChainBroken { .. } => {
                MedCabError::DatabaseError(broken.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for MedCabError {
    fn from(e: serde_json::Error) -> Self {
        MedCabError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MedCabError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MedCabError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<MedCabCore>, MedCabError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(MedCabCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MedCabCore>, MedCabError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(MedCabCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct MedCabCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl MedCabCore {
    // =========================================================================
    // Check-In Operations
    // =========================================================================

    /// Create a new lot.
    pub fn create_lot(
        &self,
        lot_code: String,
        source: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiLot, MedCabError> {
        let db = self.db.lock()?;
        let mut lot = Lot::new(lot_code);
        lot.source = source;
        lot.notes = notes;
        db.insert_lot(&lot)?;
        Ok(lot.into())
    }

    /// List all lots, newest first.
    pub fn get_lots(&self) -> Result<Vec<FfiLot>, MedCabError> {
        let db = self.db.lock()?;
        let lots = db.list_lots()?;
        Ok(lots.into_iter().map(|l| l.into()).collect())
    }

    /// Batch check-in: create identical units of one drug, fully available.
    pub fn check_in_units(
        &self,
        request: FfiCheckInRequest,
    ) -> Result<FfiCheckInReceipt, MedCabError> {
        let mut db = self.db.lock()?;
        let receipt = StockService::new(&mut db).check_in(&request.into())?;
        Ok(receipt.into())
    }

    // =========================================================================
    // Unit Operations
    // =========================================================================

    /// Get a unit with its drug display fields (scan screen).
    pub fn get_unit(&self, unit_id: String) -> Result<Option<FfiUnitDetail>, MedCabError> {
        let db = self.db.lock()?;
        let detail = db.get_unit_detail(&unit_id)?;
        Ok(detail.map(|d| d.into()))
    }

    /// Search units by medication name or NDC.
    pub fn search_units(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiUnitDetail>, MedCabError> {
        let db = self.db.lock()?;
        let details = db.search_units(&query, limit as usize)?;
        Ok(details.into_iter().map(|d| d.into()).collect())
    }

    /// Manual correction of a unit's quantities (admin).
    pub fn adjust_unit(
        &self,
        unit_id: String,
        new_total: f64,
        new_available: f64,
        performed_by: String,
        notes: Option<String>,
    ) -> Result<FfiAdjustReceipt, MedCabError> {
        let mut db = self.db.lock()?;
        let receipt = StockService::new(&mut db).adjust_unit(
            &unit_id,
            new_total,
            new_available,
            &performed_by,
            notes.as_deref(),
        )?;
        Ok(receipt.into())
    }

    // =========================================================================
    // Checkout Operations
    // =========================================================================

    /// Check out from one specific unit. Fails rather than pulling from other
    /// units when this one cannot cover the quantity.
    pub fn check_out_unit(
        &self,
        unit_id: String,
        quantity: f64,
        performed_by: String,
        patient_ref: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiCheckoutSummary, MedCabError> {
        let mut db = self.db.lock()?;
        let summary = CheckoutEngine::new(&mut db).checkout_unit(
            &unit_id,
            quantity,
            &performed_by,
            patient_ref.as_deref(),
            notes.as_deref(),
        )?;
        Ok(summary.into())
    }

    /// FEFO checkout across all matching units, earliest expiry first.
    pub fn check_out_fefo(
        &self,
        key: FfiDrugKey,
        quantity: f64,
        performed_by: String,
        patient_ref: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiCheckoutSummary, MedCabError> {
        let key: DrugKey = key.try_into()?;
        let mut db = self.db.lock()?;
        let summary = CheckoutEngine::new(&mut db).checkout_fefo(
            &key,
            quantity,
            &performed_by,
            patient_ref.as_deref(),
            notes.as_deref(),
        )?;
        Ok(summary.into())
    }

    // =========================================================================
    // Log & Report Operations
    // =========================================================================

    /// Most recent transactions first.
    pub fn list_transactions(&self, limit: u32) -> Result<Vec<FfiTransaction>, MedCabError> {
        let db = self.db.lock()?;
        let txns = db.list_transactions(limit as usize)?;
        Ok(txns.into_iter().map(|t| t.into()).collect())
    }

    /// All transactions for one unit, most recent first.
    pub fn transactions_for_unit(
        &self,
        unit_id: String,
    ) -> Result<Vec<FfiTransaction>, MedCabError> {
        let db = self.db.lock()?;
        let txns = db.transactions_for_unit(&unit_id)?;
        Ok(txns.into_iter().map(|t| t.into()).collect())
    }

    /// Headline numbers for the dashboard.
    pub fn dashboard_stats(&self) -> Result<FfiDashboardStats, MedCabError> {
        let db = self.db.lock()?;
        let stats = db.dashboard_stats()?;
        Ok(stats.into())
    }

    /// Units with stock expiring within `days` days, soonest first.
    pub fn expiring_soon(&self, days: u32, limit: u32) -> Result<Vec<FfiUnitDetail>, MedCabError> {
        let db = self.db.lock()?;
        let details = db.expiring_soon(days as i64, limit as usize)?;
        Ok(details.into_iter().map(|d| d.into()).collect())
    }

    /// Verify the transaction log hash chain end to end.
    pub fn verify_audit_chain(&self) -> Result<FfiChainStats, MedCabError> {
        let db = self.db.lock()?;
        let stats = audit::verify_chain(&db)?;
        Ok(stats.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe drug matching key. Supply either `ndc_id`, or all of
/// `medication_name` + `strength` + `strength_unit`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugKey {
    pub ndc_id: Option<String>,
    pub medication_name: Option<String>,
    pub strength: Option<f64>,
    pub strength_unit: Option<String>,
}

impl TryFrom<FfiDrugKey> for DrugKey {
    type Error = MedCabError;

    fn try_from(key: FfiDrugKey) -> Result<Self, Self::Error> {
        if let Some(ndc) = key.ndc_id {
            return Ok(DrugKey::Ndc(ndc));
        }
        match (key.medication_name, key.strength, key.strength_unit) {
            (Some(medication_name), Some(strength), Some(strength_unit)) => Ok(DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            }),
            _ => Err(MedCabError::InvalidRequest(
                "matching key requires an NDC, or medication name + strength + strength unit"
                    .into(),
            )),
        }
    }
}

/// FFI-safe lot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLot {
    pub lot_id: String,
    pub lot_code: String,
    pub source: Option<String>,
    pub notes: Option<String>,
}

impl From<Lot> for FfiLot {
    fn from(lot: Lot) -> Self {
        Self {
            lot_id: lot.lot_id,
            lot_code: lot.lot_code,
            source: lot.source,
            notes: lot.notes,
        }
    }
}

/// FFI-safe check-in request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckInRequest {
    pub ndc_id: Option<String>,
    pub medication_name: String,
    pub strength: f64,
    pub strength_unit: String,
    pub form: Option<String>,
    pub lot_id: Option<String>,
    pub quantity_per_unit: f64,
    pub unit_count: u32,
    pub expiry_date: String,
    pub performed_by: String,
    pub notes: Option<String>,
}

impl From<FfiCheckInRequest> for CheckInRequest {
    fn from(req: FfiCheckInRequest) -> Self {
        CheckInRequest {
            ndc_id: req.ndc_id,
            medication_name: req.medication_name,
            strength: req.strength,
            strength_unit: req.strength_unit,
            form: req.form,
            lot_id: req.lot_id,
            quantity_per_unit: req.quantity_per_unit,
            unit_count: req.unit_count,
            expiry_date: req.expiry_date,
            performed_by: req.performed_by,
            notes: req.notes,
        }
    }
}

/// FFI-safe check-in receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckInReceipt {
    pub unit_ids: Vec<String>,
    pub transaction_ids: Vec<String>,
}

impl From<CheckInReceipt> for FfiCheckInReceipt {
    fn from(receipt: CheckInReceipt) -> Self {
        Self {
            unit_ids: receipt.units.into_iter().map(|u| u.unit_id).collect(),
            transaction_ids: receipt.transaction_ids,
        }
    }
}

/// FFI-safe adjustment receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAdjustReceipt {
    pub unit_id: String,
    pub total_quantity: f64,
    pub available_quantity: f64,
    pub transaction_id: String,
}

impl From<AdjustReceipt> for FfiAdjustReceipt {
    fn from(receipt: AdjustReceipt) -> Self {
        Self {
            unit_id: receipt.unit.unit_id,
            total_quantity: receipt.unit.total_quantity,
            available_quantity: receipt.unit.available_quantity,
            transaction_id: receipt.transaction_id,
        }
    }
}

/// FFI-safe unit view with drug display fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUnitDetail {
    pub unit_id: String,
    pub medication_name: String,
    pub strength: f64,
    pub strength_unit: String,
    pub ndc_id: Option<String>,
    pub lot_code: Option<String>,
    pub total_quantity: f64,
    pub available_quantity: f64,
    pub expiry_date: String,
    pub notes: Option<String>,
}

impl From<UnitDetail> for FfiUnitDetail {
    fn from(detail: UnitDetail) -> Self {
        Self {
            unit_id: detail.unit_id,
            medication_name: detail.medication_name,
            strength: detail.strength,
            strength_unit: detail.strength_unit,
            ndc_id: detail.ndc_id,
            lot_code: detail.lot_code,
            total_quantity: detail.total_quantity,
            available_quantity: detail.available_quantity,
            expiry_date: detail.expiry_date,
            notes: detail.notes,
        }
    }
}

/// FFI-safe checkout entry (one unit drawn from).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUnitUsed {
    pub unit_id: String,
    pub quantity_taken: f64,
    pub expiry_date: String,
    pub medication_name: String,
}

impl From<PlanEntry> for FfiUnitUsed {
    fn from(entry: PlanEntry) -> Self {
        Self {
            unit_id: entry.unit_id,
            quantity_taken: entry.quantity_taken,
            expiry_date: entry.expiry_date,
            medication_name: entry.medication_name,
        }
    }
}

/// FFI-safe checkout result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckoutSummary {
    pub total_quantity_dispensed: f64,
    pub units_used: Vec<FfiUnitUsed>,
    pub transaction_ids: Vec<String>,
}

impl From<CheckoutSummary> for FfiCheckoutSummary {
    fn from(summary: CheckoutSummary) -> Self {
        Self {
            total_quantity_dispensed: summary.total_quantity_dispensed,
            units_used: summary.units_used.into_iter().map(|e| e.into()).collect(),
            transaction_ids: summary.transaction_ids,
        }
    }
}

/// FFI-safe transaction record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTransaction {
    pub transaction_id: String,
    pub unit_id: String,
    pub kind: String,
    pub quantity: f64,
    pub performed_by: String,
    pub patient_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<Transaction> for FfiTransaction {
    fn from(txn: Transaction) -> Self {
        Self {
            transaction_id: txn.transaction_id,
            unit_id: txn.unit_id,
            kind: txn.kind.as_str().to_string(),
            quantity: txn.quantity,
            performed_by: txn.performed_by,
            patient_ref: txn.patient_ref,
            notes: txn.notes,
            created_at: txn.created_at,
        }
    }
}

/// FFI-safe dashboard stats.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboardStats {
    pub units_in_stock: u32,
    pub total_available: f64,
    pub expiring_soon: u32,
    pub expired: u32,
}

impl From<DashboardStats> for FfiDashboardStats {
    fn from(stats: DashboardStats) -> Self {
        Self {
            units_in_stock: stats.units_in_stock,
            total_available: stats.total_available,
            expiring_soon: stats.expiring_soon,
            expired: stats.expired,
        }
    }
}

/// FFI-safe audit chain state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainStats {
    pub tip_hash: Option<String>,
    pub length: u32,
}

impl From<ChainStats> for FfiChainStats {
    fn from(stats: ChainStats) -> Self {
        Self {
            tip_hash: stats.tip_hash,
            length: stats.length,
        }
    }
}
