//! Drug database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{Drug, DrugKey};

impl Database {
    /// Insert a new drug.
    pub fn insert_drug(&self, drug: &Drug) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO drugs (
                drug_id, ndc_id, medication_name, strength, strength_unit, form, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                drug.drug_id,
                drug.ndc_id,
                drug.medication_name,
                drug.strength,
                drug.strength_unit,
                drug.form,
                drug.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a drug by ID.
    pub fn get_drug(&self, drug_id: &str) -> DbResult<Option<Drug>> {
        self.conn
            .query_row(
                r#"
                SELECT drug_id, ndc_id, medication_name, strength, strength_unit, form, created_at
                FROM drugs
                WHERE drug_id = ?
                "#,
                [drug_id],
                map_drug_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find a drug by matching key: exact NDC, or exact profile triple.
    pub fn find_drug_by_key(&self, key: &DrugKey) -> DbResult<Option<Drug>> {
        let result = match key {
            DrugKey::Ndc(ndc) => self
                .conn
                .query_row(
                    r#"
                    SELECT drug_id, ndc_id, medication_name, strength, strength_unit, form, created_at
                    FROM drugs
                    WHERE ndc_id = ?
                    "#,
                    [ndc],
                    map_drug_row,
                )
                .optional()?,
            DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            } => self
                .conn
                .query_row(
                    r#"
                    SELECT drug_id, ndc_id, medication_name, strength, strength_unit, form, created_at
                    FROM drugs
                    WHERE medication_name = ?1 AND strength = ?2 AND strength_unit = ?3
                    ORDER BY created_at
                    LIMIT 1
                    "#,
                    params![medication_name, strength, strength_unit],
                    map_drug_row,
                )
                .optional()?,
        };
        Ok(result)
    }

    /// Find the drug for a key, creating it if no match exists. Returns the
    /// drug and whether it was newly created.
    pub fn find_or_create_drug(
        &self,
        ndc_id: Option<&str>,
        medication_name: &str,
        strength: f64,
        strength_unit: &str,
        form: Option<&str>,
    ) -> DbResult<(Drug, bool)> {
        let key = match ndc_id {
            Some(ndc) => DrugKey::Ndc(ndc.to_string()),
            None => DrugKey::Profile {
                medication_name: medication_name.to_string(),
                strength,
                strength_unit: strength_unit.to_string(),
            },
        };

        if let Some(existing) = self.find_drug_by_key(&key)? {
            return Ok((existing, false));
        }

        let mut drug = Drug::new(medication_name.to_string(), strength, strength_unit.to_string());
        drug.ndc_id = ndc_id.map(str::to_string);
        drug.form = form.map(str::to_string);
        self.insert_drug(&drug)?;
        Ok((drug, true))
    }
}

fn map_drug_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Drug> {
    Ok(Drug {
        drug_id: row.get(0)?,
        ndc_id: row.get(1)?,
        medication_name: row.get(2)?,
        strength: row.get(3)?,
        strength_unit: row.get(4)?,
        form: row.get(5)?,
        created_at: row.get(6)?,
    })
}
