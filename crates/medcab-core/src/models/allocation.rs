//! Allocation plan models.

use serde::{Deserialize, Serialize};

/// A unit eligible for FEFO allocation, as read at plan time.
///
/// Carries the drug display name so checkout results can be rendered without
/// a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateUnit {
    /// Unit ID
    pub unit_id: String,
    /// Medication name (for display/audit)
    pub medication_name: String,
    /// Available quantity as read at plan time
    pub available_quantity: f64,
    /// Expiry date as YYYY-MM-DD
    pub expiry_date: String,
    /// Check-in timestamp, the FEFO tie-breaker
    pub created_at: String,
}

/// One draw in an allocation plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanEntry {
    /// Unit to draw from
    pub unit_id: String,
    /// Quantity to take from this unit
    pub quantity_taken: f64,
    /// Unit expiry date (for display/audit)
    pub expiry_date: String,
    /// Medication name (for display/audit)
    pub medication_name: String,
}

/// The computed distribution of a requested quantity across units, ordered
/// earliest-expiry first.
///
/// A plan is a pure read: nothing is decremented until it is committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationPlan {
    /// Draws in FEFO order
    pub entries: Vec<PlanEntry>,
    /// Sum of quantities taken; equals the requested quantity
    pub total_quantity: f64,
}

impl AllocationPlan {
    /// Number of units this plan touches.
    pub fn unit_count(&self) -> usize {
        self.entries.len()
    }
}

/// Result of a committed checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSummary {
    /// Total quantity dispensed across all units
    pub total_quantity_dispensed: f64,
    /// Units drawn from, in FEFO order, with per-unit quantities
    pub units_used: Vec<PlanEntry>,
    /// IDs of the check_out transactions created, one per unit touched
    pub transaction_ids: Vec<String>,
}
