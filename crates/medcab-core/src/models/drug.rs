//! Drug identity models.

use serde::{Deserialize, Serialize};

/// A drug identity that inventory units reference.
///
/// Identity is either the NDC code (when the package carries one) or the
/// hand-entered profile of name + strength + strength unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    /// Unique drug ID
    pub drug_id: String,
    /// National Drug Code - unique when present, absent for hand-entered meds
    pub ndc_id: Option<String>,
    /// Medication name (e.g., "Amoxicillin")
    pub medication_name: String,
    /// Strength value (e.g., 500.0)
    pub strength: f64,
    /// Strength unit (e.g., "mg")
    pub strength_unit: String,
    /// Dosage form (e.g., "tablet", "vial")
    pub form: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl Drug {
    /// Create a new drug with required fields.
    pub fn new(medication_name: String, strength: f64, strength_unit: String) -> Self {
        Self {
            drug_id: uuid::Uuid::new_v4().to_string(),
            ndc_id: None,
            medication_name,
            strength,
            strength_unit,
            form: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The matching key this drug answers to.
    pub fn key(&self) -> DrugKey {
        match &self.ndc_id {
            Some(ndc) => DrugKey::Ndc(ndc.clone()),
            None => DrugKey::Profile {
                medication_name: self.medication_name.clone(),
                strength: self.strength,
                strength_unit: self.strength_unit.clone(),
            },
        }
    }
}

/// Key used to select allocation candidates for a medication.
///
/// NDC takes priority; the profile triple is the fallback for hand-entered
/// medications that lack one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DrugKey {
    /// Exact NDC code match
    Ndc(String),
    /// Exact (name, strength, strength unit) match
    Profile {
        medication_name: String,
        strength: f64,
        strength_unit: String,
    },
}

impl DrugKey {
    /// Validate the key is well-formed. Returns a description of the problem
    /// if it is not.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DrugKey::Ndc(ndc) => {
                if ndc.trim().is_empty() {
                    return Err("NDC code must not be empty".into());
                }
            }
            DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            } => {
                if medication_name.trim().is_empty() {
                    return Err("medication name must not be empty".into());
                }
                if strength_unit.trim().is_empty() {
                    return Err("strength unit must not be empty".into());
                }
                if !strength.is_finite() || *strength <= 0.0 {
                    return Err(format!("strength must be positive, got {}", strength));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for DrugKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrugKey::Ndc(ndc) => write!(f, "NDC {}", ndc),
            DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            } => write!(f, "{} {}{}", medication_name, strength, strength_unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_drug() {
        let drug = Drug::new("Amoxicillin".into(), 500.0, "mg".into());
        assert_eq!(drug.medication_name, "Amoxicillin");
        assert!(drug.ndc_id.is_none());
        assert_eq!(drug.drug_id.len(), 36); // UUID format
    }

    #[test]
    fn test_key_prefers_ndc() {
        let mut drug = Drug::new("Amoxicillin".into(), 500.0, "mg".into());
        assert!(matches!(drug.key(), DrugKey::Profile { .. }));

        drug.ndc_id = Some("0781-1506-10".into());
        assert_eq!(drug.key(), DrugKey::Ndc("0781-1506-10".into()));
    }

    #[test]
    fn test_key_validation() {
        assert!(DrugKey::Ndc("0781-1506-10".into()).validate().is_ok());
        assert!(DrugKey::Ndc("   ".into()).validate().is_err());

        let profile = DrugKey::Profile {
            medication_name: "Amoxicillin".into(),
            strength: 500.0,
            strength_unit: "mg".into(),
        };
        assert!(profile.validate().is_ok());

        let bad_strength = DrugKey::Profile {
            medication_name: "Amoxicillin".into(),
            strength: 0.0,
            strength_unit: "mg".into(),
        };
        assert!(bad_strength.validate().is_err());
    }
}
