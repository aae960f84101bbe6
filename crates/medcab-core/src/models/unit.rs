//! Inventory unit and lot models.

use serde::{Deserialize, Serialize};

/// A batch/location grouping under which units were received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    /// Unique lot ID
    pub lot_id: String,
    /// Short lot code (e.g., drawer/side like "AL")
    pub lot_code: String,
    /// Where the stock came from (donation, purchase, ...)
    pub source: Option<String>,
    /// Additional notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl Lot {
    /// Create a new lot with required fields.
    pub fn new(lot_code: String) -> Self {
        Self {
            lot_id: uuid::Uuid::new_v4().to_string(),
            lot_code,
            source: None,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One receivable, trackable container of medication.
///
/// Units are never deleted; a fully dispensed unit simply sits at
/// `available_quantity == 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryUnit {
    /// Unique unit ID
    pub unit_id: String,
    /// Owning drug ID
    pub drug_id: String,
    /// Lot this unit was received under
    pub lot_id: Option<String>,
    /// Quantity the container held at check-in
    pub total_quantity: f64,
    /// Quantity still available for dispensing
    pub available_quantity: f64,
    /// Expiry date as YYYY-MM-DD (lexicographic order == calendar order)
    pub expiry_date: String,
    /// Additional notes
    pub notes: Option<String>,
    /// Creation timestamp (check-in time)
    pub created_at: String,
}

impl InventoryUnit {
    /// Create a new unit at check-in, fully available.
    pub fn new(drug_id: String, quantity: f64, expiry_date: String) -> Self {
        Self {
            unit_id: uuid::Uuid::new_v4().to_string(),
            drug_id,
            lot_id: None,
            total_quantity: quantity,
            available_quantity: quantity,
            expiry_date,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Check the quantity invariant `0 <= available <= total`.
    pub fn quantities_valid(&self) -> bool {
        self.total_quantity.is_finite()
            && self.available_quantity.is_finite()
            && self.available_quantity >= 0.0
            && self.available_quantity <= self.total_quantity
    }

    /// True once nothing is left to dispense.
    pub fn is_exhausted(&self) -> bool {
        self.available_quantity <= 0.0
    }

    /// True if the expiry date falls strictly before the given YYYY-MM-DD date.
    pub fn is_expired_on(&self, date: &str) -> bool {
        self.expiry_date.as_str() < date
    }
}

/// A flattened unit view with drug display fields, for callers that render
/// units directly (scan screen, search results).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDetail {
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
    pub created_at: String,
}

/// A batch check-in instruction: create `unit_count` identical units of one
/// drug, each fully available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckInRequest {
    /// NDC code if the package carries one
    pub ndc_id: Option<String>,
    /// Medication name
    pub medication_name: String,
    /// Strength value
    pub strength: f64,
    /// Strength unit
    pub strength_unit: String,
    /// Dosage form
    pub form: Option<String>,
    /// Lot to file the units under
    pub lot_id: Option<String>,
    /// Quantity per container
    pub quantity_per_unit: f64,
    /// Number of identical containers
    pub unit_count: u32,
    /// Expiry date as YYYY-MM-DD
    pub expiry_date: String,
    /// User performing the check-in
    pub performed_by: String,
    /// Additional notes
    pub notes: Option<String>,
}

impl CheckInRequest {
    /// Validate the request. Returns a description of the problem if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.medication_name.trim().is_empty() {
            return Err("medication name must not be empty".into());
        }
        if !self.quantity_per_unit.is_finite() || self.quantity_per_unit <= 0.0 {
            return Err(format!(
                "quantity per unit must be positive, got {}",
                self.quantity_per_unit
            ));
        }
        if self.unit_count == 0 {
            return Err("unit count must be at least 1".into());
        }
        if chrono::NaiveDate::parse_from_str(&self.expiry_date, "%Y-%m-%d").is_err() {
            return Err(format!(
                "expiry date must be YYYY-MM-DD, got {:?}",
                self.expiry_date
            ));
        }
        Ok(())
    }
}
