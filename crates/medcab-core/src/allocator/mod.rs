//! FEFO (First-Expired-First-Out) checkout allocation.
//!
//! The planner is a pure function from (candidates, requested quantity) to an
//! [`AllocationPlan`]: it sorts candidates earliest-expiry first and greedily
//! drains them until the request is satisfied. It performs no I/O and never
//! mutates unit state; applying a plan is the job of [`CheckoutEngine`],
//! which commits it atomically with an optimistic-concurrency check.
//!
//! Expired units are eligible on purpose. The allocator's contract is
//! ordering ("drain oldest first"), not business-rule gatekeeping; excluding
//! or flagging expired stock is policy that belongs to the layer above.

mod checkout;

pub use checkout::CheckoutEngine;

use thiserror::Error;

use crate::db::DbError;
use crate::models::{AllocationPlan, CandidateUnit, PlanEntry};

/// Allocation and checkout errors.
#[derive(Error, Debug)]
pub enum AllocationError {
    /// Rejected before any read: non-positive quantity or malformed key.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Specific-unit checkout named a unit that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Matched stock cannot cover the request. Carries the most the caller
    /// could get, so it can offer a reduced-quantity retry.
    #[error("Insufficient stock: requested {requested}, only {max_fulfillable} available")]
    InsufficientStock { requested: f64, max_fulfillable: f64 },

    /// A concurrent checkout invalidated the plan between read and commit.
    /// Safe to retry the whole allocate+commit sequence from scratch; never
    /// re-apply the stale plan.
    #[error("Commit conflict: {0}")]
    CommitConflict(String),

    /// Persistence failure. The atomic commit leaves no partial state behind.
    #[error("Database error: {0}")]
    Internal(#[from] DbError),
}

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Compute a FEFO allocation plan across a candidate set.
///
/// Candidates are sorted ascending by expiry date, then check-in timestamp
/// (oldest received first), then unit ID, making the plan deterministic for
/// any input ordering. Each unit is drained in turn until the requested
/// quantity is covered.
///
/// Fails as a whole if the candidates cannot cover the request; partial
/// dispensing is never silently accepted.
pub fn plan(candidates: &[CandidateUnit], requested: f64) -> AllocationResult<AllocationPlan> {
    validate_requested(requested)?;

    let mut sorted: Vec<&CandidateUnit> = candidates
        .iter()
        .filter(|c| c.available_quantity > 0.0)
        .collect();
    sorted.sort_by(|a, b| {
        (&a.expiry_date, &a.created_at, &a.unit_id).cmp(&(&b.expiry_date, &b.created_at, &b.unit_id))
    });

    let mut entries = Vec::new();
    let mut remaining = requested;
    for candidate in sorted {
        if remaining <= 0.0 {
            break;
        }
        let taken = remaining.min(candidate.available_quantity);
        entries.push(PlanEntry {
            unit_id: candidate.unit_id.clone(),
            quantity_taken: taken,
            expiry_date: candidate.expiry_date.clone(),
            medication_name: candidate.medication_name.clone(),
        });
        remaining -= taken;
    }

    if remaining > 0.0 {
        return Err(AllocationError::InsufficientStock {
            requested,
            max_fulfillable: candidates.iter().map(|c| c.available_quantity.max(0.0)).sum(),
        });
    }

    Ok(AllocationPlan {
        entries,
        total_quantity: requested,
    })
}

/// Compute a single-unit plan (specific-unit checkout).
///
/// Degenerate case of [`plan`]: the candidate set is exactly one unit, so the
/// algorithm collapses to a bounds check. Never pulls from other units; its
/// insufficiency names this unit's stock, not the medication's.
pub fn plan_single(unit: &CandidateUnit, requested: f64) -> AllocationResult<AllocationPlan> {
    validate_requested(requested)?;

    if requested > unit.available_quantity {
        return Err(AllocationError::InsufficientStock {
            requested,
            max_fulfillable: unit.available_quantity.max(0.0),
        });
    }

    Ok(AllocationPlan {
        entries: vec![PlanEntry {
            unit_id: unit.unit_id.clone(),
            quantity_taken: requested,
            expiry_date: unit.expiry_date.clone(),
            medication_name: unit.medication_name.clone(),
        }],
        total_quantity: requested,
    })
}

fn validate_requested(requested: f64) -> AllocationResult<()> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(AllocationError::InvalidRequest(format!(
            "requested quantity must be positive, got {}",
            requested
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(unit_id: &str, avail: f64, expiry: &str, created: &str) -> CandidateUnit {
        CandidateUnit {
            unit_id: unit_id.into(),
            medication_name: "Amoxicillin".into(),
            available_quantity: avail,
            expiry_date: expiry.into(),
            created_at: created.into(),
        }
    }

    #[test]
    fn test_spans_units_earliest_expiry_first() {
        // A(avail=3, exp=2024-01-01), B(avail=5, exp=2024-02-01); request 4
        let candidates = vec![
            candidate("B", 5.0, "2024-02-01", "2023-01-02T00:00:00Z"),
            candidate("A", 3.0, "2024-01-01", "2023-01-01T00:00:00Z"),
        ];

        let plan = plan(&candidates, 4.0).unwrap();
        assert_eq!(plan.total_quantity, 4.0);
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].unit_id, "A");
        assert_eq!(plan.entries[0].quantity_taken, 3.0);
        assert_eq!(plan.entries[1].unit_id, "B");
        assert_eq!(plan.entries[1].quantity_taken, 1.0);
    }

    #[test]
    fn test_insufficient_reports_max_fulfillable() {
        let candidates = vec![
            candidate("A", 3.0, "2024-01-01", "2023-01-01T00:00:00Z"),
            candidate("B", 5.0, "2024-02-01", "2023-01-02T00:00:00Z"),
        ];

        let err = plan(&candidates, 10.0).unwrap_err();
        match err {
            AllocationError::InsufficientStock {
                requested,
                max_fulfillable,
            } => {
                assert_eq!(requested, 10.0);
                assert_eq!(max_fulfillable, 8.0);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_candidates() {
        let err = plan(&[], 1.0).unwrap_err();
        match err {
            AllocationError::InsufficientStock { max_fulfillable, .. } => {
                assert_eq!(max_fulfillable, 0.0);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_positive_request() {
        let candidates = vec![candidate("A", 5.0, "2024-01-01", "2023-01-01T00:00:00Z")];
        assert!(matches!(
            plan(&candidates, 0.0),
            Err(AllocationError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan(&candidates, -2.0),
            Err(AllocationError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan(&candidates, f64::NAN),
            Err(AllocationError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_single(&candidates[0], 0.0),
            Err(AllocationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_tie_break_on_check_in_time() {
        // Same expiry date: the earlier-received unit drains first
        let candidates = vec![
            candidate("newer", 5.0, "2024-01-01", "2023-06-01T00:00:00Z"),
            candidate("older", 5.0, "2024-01-01", "2023-01-01T00:00:00Z"),
        ];

        let plan = plan(&candidates, 3.0).unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].unit_id, "older");
    }

    #[test]
    fn test_deterministic_for_any_input_order() {
        let a = candidate("A", 2.0, "2024-01-01", "2023-01-01T00:00:00Z");
        let b = candidate("B", 2.0, "2024-02-01", "2023-01-01T00:00:00Z");
        let c = candidate("C", 2.0, "2024-03-01", "2023-01-01T00:00:00Z");

        let forward = plan(&[a.clone(), b.clone(), c.clone()], 5.0).unwrap();
        let reverse = plan(&[c, b, a], 5.0).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_skips_exhausted_candidates() {
        let candidates = vec![
            candidate("empty", 0.0, "2024-01-01", "2023-01-01T00:00:00Z"),
            candidate("stocked", 5.0, "2024-02-01", "2023-01-02T00:00:00Z"),
        ];

        let plan = plan(&candidates, 5.0).unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].unit_id, "stocked");
    }

    #[test]
    fn test_expired_stock_still_drains_first() {
        let candidates = vec![
            candidate("fresh", 5.0, "2099-01-01", "2023-01-01T00:00:00Z"),
            candidate("expired", 5.0, "2000-01-01", "2023-01-01T00:00:00Z"),
        ];

        let plan = plan(&candidates, 2.0).unwrap();
        assert_eq!(plan.entries[0].unit_id, "expired");
    }

    #[test]
    fn test_single_unit_bounds_check() {
        let unit = candidate("C", 2.0, "2024-01-01", "2023-01-01T00:00:00Z");

        let plan = plan_single(&unit, 2.0).unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].quantity_taken, 2.0);

        // No cross-unit pull: insufficiency reflects this unit alone
        let err = plan_single(&unit, 5.0).unwrap_err();
        match err {
            AllocationError::InsufficientStock {
                requested,
                max_fulfillable,
            } => {
                assert_eq!(requested, 5.0);
                assert_eq!(max_fulfillable, 2.0);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_conserves_quantity() {
        let candidates = vec![
            candidate("A", 1.5, "2024-01-01", "2023-01-01T00:00:00Z"),
            candidate("B", 2.5, "2024-02-01", "2023-01-02T00:00:00Z"),
            candidate("C", 4.0, "2024-03-01", "2023-01-03T00:00:00Z"),
        ];

        let plan = plan(&candidates, 6.0).unwrap();
        let total: f64 = plan.entries.iter().map(|e| e.quantity_taken).sum();
        assert_eq!(total, 6.0);
        // No entry overdraws its unit
        for entry in &plan.entries {
            let avail = candidates
                .iter()
                .find(|c| c.unit_id == entry.unit_id)
                .unwrap()
                .available_quantity;
            assert!(entry.quantity_taken <= avail);
        }
    }
}
