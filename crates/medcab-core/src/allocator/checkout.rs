//! Atomic checkout commit.

use crate::audit;
use crate::db::{transactions, units, Database, DbError};
use crate::models::{
    AllocationPlan, CheckoutSummary, DrugKey, Transaction, TransactionKind,
};

use super::{plan, plan_single, AllocationError, AllocationResult};

/// Applies allocation plans to persisted state indivisibly.
///
/// Each commit runs inside one SQLite transaction. Every decrement is
/// conditional on the unit still holding the planned quantity, so two
/// checkouts racing over the same unit cannot both win: the loser's commit
/// rolls back entirely and surfaces [`AllocationError::CommitConflict`].
/// Retry policy belongs to the caller, which must re-read candidates and
/// recompute the plan rather than re-apply the stale one.
pub struct CheckoutEngine<'a> {
    db: &'a mut Database,
}

impl<'a> CheckoutEngine<'a> {
    /// Create a new checkout engine.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// FEFO checkout: drain matching units earliest-expiry first.
    pub fn checkout_fefo(
        &mut self,
        key: &DrugKey,
        requested: f64,
        performed_by: &str,
        patient_ref: Option<&str>,
        notes: Option<&str>,
    ) -> AllocationResult<CheckoutSummary> {
        key.validate().map_err(AllocationError::InvalidRequest)?;

        let candidates = self.db.fefo_candidates(key)?;
        let plan = plan(&candidates, requested)?;
        self.commit_plan(&plan, performed_by, patient_ref, notes)
    }

    /// Specific-unit checkout: bounds check against that one unit, no
    /// cross-unit pull.
    pub fn checkout_unit(
        &mut self,
        unit_id: &str,
        requested: f64,
        performed_by: &str,
        patient_ref: Option<&str>,
        notes: Option<&str>,
    ) -> AllocationResult<CheckoutSummary> {
        let unit = self
            .db
            .candidate_by_unit_id(unit_id)?
            .ok_or_else(|| AllocationError::NotFound(format!("unit {}", unit_id)))?;

        let plan = plan_single(&unit, requested)?;
        self.commit_plan(&plan, performed_by, patient_ref, notes)
    }

    /// Apply a plan: all decrements and transaction records commit together,
    /// or none do.
    ///
    /// Public so a caller holding a plan can commit it separately, but the
    /// plan must be fresh; a plan computed before any other commit touched
    /// its units will be rejected with a conflict.
    pub fn commit_plan(
        &mut self,
        plan: &AllocationPlan,
        performed_by: &str,
        patient_ref: Option<&str>,
        notes: Option<&str>,
    ) -> AllocationResult<CheckoutSummary> {
        let tx = self.db.transaction()?;
        let mut prev_hash = transactions::chain_tip(&tx)?;
        let mut transaction_ids = Vec::with_capacity(plan.entries.len());

        for entry in &plan.entries {
            // Conditional decrement; zero rows means a concurrent checkout
            // got here first. Dropping `tx` rolls back everything so far.
            if !units::decrement_available(&tx, &entry.unit_id, entry.quantity_taken)? {
                return Err(AllocationError::CommitConflict(format!(
                    "unit {} no longer has {} available",
                    entry.unit_id, entry.quantity_taken
                )));
            }

            let mut txn = Transaction::new(
                entry.unit_id.clone(),
                TransactionKind::CheckOut,
                entry.quantity_taken,
                performed_by.to_string(),
            );
            txn.patient_ref = patient_ref.map(str::to_string);
            txn.notes = notes.map(str::to_string);
            audit::seal(&mut txn, &prev_hash).map_err(DbError::Json)?;

            transactions::insert_transaction(&tx, &txn)?;
            prev_hash = txn.entry_hash.clone();
            transaction_ids.push(txn.transaction_id);
        }

        tx.commit().map_err(DbError::Sqlite)?;

        Ok(CheckoutSummary {
            total_quantity_dispensed: plan.total_quantity,
            units_used: plan.entries.clone(),
            transaction_ids,
        })
    }
}
