//! Transaction (audit log) models.

use serde::{Deserialize, Serialize};

/// What a transaction did to its unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    /// Stock received; unit created fully available
    CheckIn,
    /// Stock dispensed; available quantity decremented
    CheckOut,
    /// Manual correction of quantities
    Adjust,
}

impl TransactionKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::CheckIn => "check_in",
            TransactionKind::CheckOut => "check_out",
            TransactionKind::Adjust => "adjust",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "check_in" => Some(TransactionKind::CheckIn),
            "check_out" => Some(TransactionKind::CheckOut),
            "adjust" => Some(TransactionKind::Adjust),
            _ => None,
        }
    }
}

/// An immutable audit record of one quantity change on one unit.
///
/// Transactions are append-only: the schema rejects updates and deletes, and
/// each entry is hash-chained to its predecessor so tampering with history is
/// detectable (see [`crate::audit`]). A committed checkout is reversed only by
/// a new compensating adjust transaction, never by editing the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Unique transaction ID
    pub transaction_id: String,
    /// Unit this transaction touched
    pub unit_id: String,
    /// What happened
    pub kind: TransactionKind,
    /// Quantity moved. Positive for check-in/check-out; signed available-delta
    /// for adjustments.
    pub quantity: f64,
    /// Acting user
    pub performed_by: String,
    /// Patient reference for dispensing audits
    pub patient_ref: Option<String>,
    /// Additional notes
    pub notes: Option<String>,
    /// Entry hash of the previous transaction ("" for the first entry)
    pub prev_hash: String,
    /// sha256(prev_hash || canonical payload)
    pub entry_hash: String,
    /// Creation timestamp
    pub created_at: String,
}

/// The hashed portion of a transaction, serialized with a fixed field order.
#[derive(Serialize)]
struct TransactionPayload<'a> {
    transaction_id: &'a str,
    unit_id: &'a str,
    kind: &'a str,
    quantity: f64,
    performed_by: &'a str,
    patient_ref: Option<&'a str>,
    notes: Option<&'a str>,
    created_at: &'a str,
}

impl Transaction {
    /// Create a new transaction with empty hash fields; the chain fields are
    /// filled in by the audit layer at insert time.
    pub fn new(unit_id: String, kind: TransactionKind, quantity: f64, performed_by: String) -> Self {
        Self {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            unit_id,
            kind,
            quantity,
            performed_by,
            patient_ref: None,
            notes: None,
            prev_hash: String::new(),
            entry_hash: String::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Canonical JSON of the hashed fields (excludes the hash fields
    /// themselves).
    pub fn canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&TransactionPayload {
            transaction_id: &self.transaction_id,
            unit_id: &self.unit_id,
            kind: self.kind.as_str(),
            quantity: self.quantity,
            performed_by: &self.performed_by,
            patient_ref: self.patient_ref.as_deref(),
            notes: self.notes.as_deref(),
            created_at: &self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            TransactionKind::CheckIn,
            TransactionKind::CheckOut,
            TransactionKind::Adjust,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("refund"), None);
    }

    #[test]
    fn test_canonical_json_stable() {
        let txn = Transaction::new("unit-1".into(), TransactionKind::CheckOut, 3.0, "nurse1".into());
        let a = txn.canonical_json().unwrap();
        let b = txn.canonical_json().unwrap();
        assert_eq!(a, b);
        assert!(a.contains(r#""kind":"check_out""#));
        // Hash fields never enter the payload
        assert!(!a.contains("entry_hash"));
        assert!(!a.contains("prev_hash"));
    }
}
