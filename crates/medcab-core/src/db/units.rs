//! Inventory unit database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{CandidateUnit, DrugKey, InventoryUnit, UnitDetail};

impl Database {
    /// Insert a new inventory unit.
    pub fn insert_unit(&self, unit: &InventoryUnit) -> DbResult<()> {
        insert_unit(&self.conn, unit)
    }

    /// Get a unit by ID.
    pub fn get_unit(&self, unit_id: &str) -> DbResult<Option<InventoryUnit>> {
        self.conn
            .query_row(
                r#"
                SELECT unit_id, drug_id, lot_id, total_quantity, available_quantity,
                       expiry_date, notes, created_at
                FROM inventory_units
                WHERE unit_id = ?
                "#,
                [unit_id],
                map_unit_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a unit with its drug display fields.
    pub fn get_unit_detail(&self, unit_id: &str) -> DbResult<Option<UnitDetail>> {
        self.conn
            .query_row(
                r#"
                SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                       l.lot_code, u.total_quantity, u.available_quantity,
                       u.expiry_date, u.notes, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                LEFT JOIN lots l ON l.lot_id = u.lot_id
                WHERE u.unit_id = ?
                "#,
                [unit_id],
                map_detail_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Units eligible for FEFO allocation under the given matching key:
    /// stock remaining, earliest expiry first, check-in order on ties.
    ///
    /// Expired units are deliberately NOT excluded here; the allocator drains
    /// oldest stock first regardless, and flagging expired stock is a
    /// presentation decision made above this layer.
    pub fn fefo_candidates(&self, key: &DrugKey) -> DbResult<Vec<CandidateUnit>> {
        let sql_suffix = r#"
            AND u.available_quantity > 0
            ORDER BY u.expiry_date, u.created_at, u.unit_id
        "#;

        let mut candidates = Vec::new();
        match key {
            DrugKey::Ndc(ndc) => {
                let sql = format!(
                    r#"
                    SELECT u.unit_id, d.medication_name, u.available_quantity,
                           u.expiry_date, u.created_at
                    FROM inventory_units u
                    JOIN drugs d ON d.drug_id = u.drug_id
                    WHERE d.ndc_id = ?1
                    {}
                    "#,
                    sql_suffix
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([ndc], map_candidate_row)?;
                for row in rows {
                    candidates.push(row?);
                }
            }
            DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            } => {
                let sql = format!(
                    r#"
                    SELECT u.unit_id, d.medication_name, u.available_quantity,
                           u.expiry_date, u.created_at
                    FROM inventory_units u
                    JOIN drugs d ON d.drug_id = u.drug_id
                    WHERE d.medication_name = ?1 AND d.strength = ?2 AND d.strength_unit = ?3
                    {}
                    "#,
                    sql_suffix
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    params![medication_name, strength, strength_unit],
                    map_candidate_row,
                )?;
                for row in rows {
                    candidates.push(row?);
                }
            }
        }
        Ok(candidates)
    }

    /// A single unit as an allocation candidate (specific-unit checkout).
    pub fn candidate_by_unit_id(&self, unit_id: &str) -> DbResult<Option<CandidateUnit>> {
        self.conn
            .query_row(
                r#"
                SELECT u.unit_id, d.medication_name, u.available_quantity,
                       u.expiry_date, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                WHERE u.unit_id = ?
                "#,
                [unit_id],
                map_candidate_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Conditionally decrement a unit's available quantity.
    ///
    /// Returns false without touching the row when the unit no longer has
    /// `quantity` available (a concurrent checkout raced ahead).
    pub fn decrement_available(&self, unit_id: &str, quantity: f64) -> DbResult<bool> {
        decrement_available(&self.conn, unit_id, quantity)
    }

    /// Overwrite a unit's quantities (manual adjustment).
    ///
    /// The caller validates `0 <= available <= total`; the schema CHECK is the
    /// backstop.
    pub fn set_quantities(&self, unit_id: &str, total: f64, available: f64) -> DbResult<()> {
        set_quantities(&self.conn, unit_id, total, available)
    }

    /// Search units by medication name, NDC code, or lot code.
    ///
    /// FTS gets the candidate drugs cheaply; strsim ranking tolerates the
    /// misspellings that hand-entered medication names accumulate. Lot codes
    /// are short hand-assigned labels, matched by prefix on the join rather
    /// than a second FTS table.
    pub fn search_units(&self, query: &str, limit: usize) -> DbResult<Vec<UnitDetail>> {
        let mut details: Vec<UnitDetail> = Vec::new();

        let escaped_query = escape_fts_query(query);
        if !escaped_query.is_empty() {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                       l.lot_code, u.total_quantity, u.available_quantity,
                       u.expiry_date, u.notes, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                JOIN drugs_fts fts ON d.rowid = fts.rowid
                LEFT JOIN lots l ON l.lot_id = u.lot_id
                WHERE drugs_fts MATCH ?
                ORDER BY u.expiry_date, u.created_at
                "#,
            )?;

            let rows = stmt.query_map([&escaped_query], map_detail_row)?;
            for row in rows {
                details.push(row?);
            }
        }

        let lot_pattern = like_prefix_pattern(query);
        if !lot_pattern.is_empty() {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                       l.lot_code, u.total_quantity, u.available_quantity,
                       u.expiry_date, u.notes, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                JOIN lots l ON l.lot_id = u.lot_id
                WHERE l.lot_code LIKE ? ESCAPE '\'
                ORDER BY u.expiry_date, u.created_at
                "#,
            )?;

            let rows = stmt.query_map([&lot_pattern], map_detail_row)?;
            for row in rows {
                let detail = row?;
                if details.iter().all(|d| d.unit_id != detail.unit_id) {
                    details.push(detail);
                }
            }
        }

        // Stable sort: best match first, FEFO order within equal scores
        let query_lower = query.to_lowercase();
        details.sort_by(|a, b| {
            let score_a = match_score(&query_lower, a);
            let score_b = match_score(&query_lower, b);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        details.truncate(limit);
        Ok(details)
    }

    /// All units for a drug key, FEFO order, exhausted units included.
    pub fn list_units_for_key(&self, key: &DrugKey) -> DbResult<Vec<UnitDetail>> {
        let sql = match key {
            DrugKey::Ndc(_) => {
                r#"
                SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                       l.lot_code, u.total_quantity, u.available_quantity,
                       u.expiry_date, u.notes, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                LEFT JOIN lots l ON l.lot_id = u.lot_id
                WHERE d.ndc_id = ?1
                ORDER BY u.expiry_date, u.created_at, u.unit_id
                "#
            }
            DrugKey::Profile { .. } => {
                r#"
                SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                       l.lot_code, u.total_quantity, u.available_quantity,
                       u.expiry_date, u.notes, u.created_at
                FROM inventory_units u
                JOIN drugs d ON d.drug_id = u.drug_id
                LEFT JOIN lots l ON l.lot_id = u.lot_id
                WHERE d.medication_name = ?1 AND d.strength = ?2 AND d.strength_unit = ?3
                ORDER BY u.expiry_date, u.created_at, u.unit_id
                "#
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let mut details = Vec::new();
        match key {
            DrugKey::Ndc(ndc) => {
                let rows = stmt.query_map([ndc], map_detail_row)?;
                for row in rows {
                    details.push(row?);
                }
            }
            DrugKey::Profile {
                medication_name,
                strength,
                strength_unit,
            } => {
                let rows = stmt.query_map(
                    params![medication_name, strength, strength_unit],
                    map_detail_row,
                )?;
                for row in rows {
                    details.push(row?);
                }
            }
        }
        Ok(details)
    }
}

/// Insert a unit through any connection (plain or mid-transaction).
pub(crate) fn insert_unit(conn: &Connection, unit: &InventoryUnit) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO inventory_units (
            unit_id, drug_id, lot_id, total_quantity, available_quantity,
            expiry_date, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            unit.unit_id,
            unit.drug_id,
            unit.lot_id,
            unit.total_quantity,
            unit.available_quantity,
            unit.expiry_date,
            unit.notes,
            unit.created_at,
        ],
    )?;
    Ok(())
}

/// Conditional decrement through any connection (plain or mid-transaction).
pub(crate) fn decrement_available(
    conn: &Connection,
    unit_id: &str,
    quantity: f64,
) -> DbResult<bool> {
    // The WHERE condition is the optimistic-concurrency check: it only fires
    // when the row still holds enough stock, so a stale plan can never drive
    // available_quantity negative.
    let rows_affected = conn.execute(
        r#"
        UPDATE inventory_units
        SET available_quantity = available_quantity - ?2
        WHERE unit_id = ?1 AND available_quantity >= ?2
        "#,
        params![unit_id, quantity],
    )?;
    Ok(rows_affected > 0)
}

/// Overwrite quantities through any connection (plain or mid-transaction).
pub(crate) fn set_quantities(
    conn: &Connection,
    unit_id: &str,
    total: f64,
    available: f64,
) -> DbResult<()> {
    let rows_affected = conn.execute(
        r#"
        UPDATE inventory_units
        SET total_quantity = ?2, available_quantity = ?3
        WHERE unit_id = ?1
        "#,
        params![unit_id, total, available],
    )?;
    if rows_affected == 0 {
        return Err(DbError::NotFound(format!("unit {}", unit_id)));
    }
    Ok(())
}

fn map_unit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryUnit> {
    Ok(InventoryUnit {
        unit_id: row.get(0)?,
        drug_id: row.get(1)?,
        lot_id: row.get(2)?,
        total_quantity: row.get(3)?,
        available_quantity: row.get(4)?,
        expiry_date: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_candidate_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidateUnit> {
    Ok(CandidateUnit {
        unit_id: row.get(0)?,
        medication_name: row.get(1)?,
        available_quantity: row.get(2)?,
        expiry_date: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_detail_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnitDetail> {
    Ok(UnitDetail {
        unit_id: row.get(0)?,
        medication_name: row.get(1)?,
        strength: row.get(2)?,
        strength_unit: row.get(3)?,
        ndc_id: row.get(4)?,
        lot_code: row.get(5)?,
        total_quantity: row.get(6)?,
        available_quantity: row.get(7)?,
        expiry_date: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Prepare a user query for FTS5 prefix matching.
///
/// Punctuation becomes a token separator rather than vanishing, so an NDC
/// typed with its dashes ("0781-1506-10") produces the same tokens the
/// indexer saw ("0781* 1506* 10*").
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// LIKE prefix pattern for lot-code search, wildcards in the query escaped.
fn like_prefix_pattern(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut pattern = String::with_capacity(trimmed.len() + 1);
    for c in trimmed.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Best similarity between the query and the fields a match could have come
/// from (medication name or lot code).
fn match_score(query_lower: &str, detail: &UnitDetail) -> f64 {
    let name_score = strsim::jaro_winkler(query_lower, &detail.medication_name.to_lowercase());
    match &detail.lot_code {
        Some(code) => name_score.max(strsim::jaro_winkler(query_lower, &code.to_lowercase())),
        None => name_score,
    }
}
