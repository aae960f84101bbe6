//! Reporting queries: dashboard stats and expiry reports.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Database, DbResult};
use crate::models::UnitDetail;

/// Headline numbers for the dashboard screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    /// Units with stock remaining
    pub units_in_stock: u32,
    /// Sum of available quantity across all units
    pub total_available: f64,
    /// Units with stock expiring within 30 days (not yet expired)
    pub expiring_soon: u32,
    /// Units with stock already past expiry
    pub expired: u32,
}

impl Database {
    /// Dashboard stats as of today.
    pub fn dashboard_stats(&self) -> DbResult<DashboardStats> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(30);
        self.dashboard_stats_on(
            &today.format("%Y-%m-%d").to_string(),
            &horizon.format("%Y-%m-%d").to_string(),
        )
    }

    /// Dashboard stats against explicit date bounds (YYYY-MM-DD).
    pub fn dashboard_stats_on(&self, today: &str, horizon: &str) -> DbResult<DashboardStats> {
        self.conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(available_quantity), 0),
                    COALESCE(SUM(expiry_date >= ?1 AND expiry_date <= ?2), 0),
                    COALESCE(SUM(expiry_date < ?1), 0)
                FROM inventory_units
                WHERE available_quantity > 0
                "#,
                [today, horizon],
                |row| {
                    Ok(DashboardStats {
                        units_in_stock: row.get(0)?,
                        total_available: row.get(1)?,
                        expiring_soon: row.get(2)?,
                        expired: row.get(3)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    /// Units with stock expiring within `days` days, soonest first.
    pub fn expiring_soon(&self, days: i64, limit: usize) -> DbResult<Vec<UnitDetail>> {
        let horizon = (Utc::now().date_naive() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string();

        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.unit_id, d.medication_name, d.strength, d.strength_unit, d.ndc_id,
                   l.lot_code, u.total_quantity, u.available_quantity,
                   u.expiry_date, u.notes, u.created_at
            FROM inventory_units u
            JOIN drugs d ON d.drug_id = u.drug_id
            LEFT JOIN lots l ON l.lot_id = u.lot_id
            WHERE u.available_quantity > 0 AND u.expiry_date <= ?
            ORDER BY u.expiry_date, u.created_at
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(rusqlite::params![horizon, limit as i64], |row| {
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
        })?;

        let mut details = Vec::new();
        for row in rows {
            details.push(row?);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Drug, InventoryUnit};

    fn seed_unit(db: &Database, qty: f64, expiry: &str) {
        let drug = Drug::new(format!("Drug-{}", expiry), 500.0, "mg".into());
        db.insert_drug(&drug).unwrap();
        db.insert_unit(&InventoryUnit::new(drug.drug_id, qty, expiry.into()))
            .unwrap();
    }

    #[test]
    fn test_dashboard_stats_buckets() {
        let db = Database::open_in_memory().unwrap();
        seed_unit(&db, 10.0, "2024-01-01"); // expired
        seed_unit(&db, 5.0, "2024-06-15"); // expiring within horizon
        seed_unit(&db, 3.0, "2030-01-01"); // healthy
        seed_unit(&db, 0.0, "2024-06-15"); // exhausted, ignored entirely

        let stats = db.dashboard_stats_on("2024-06-01", "2024-07-01").unwrap();
        assert_eq!(stats.units_in_stock, 3);
        assert_eq!(stats.total_available, 18.0);
        assert_eq!(stats.expiring_soon, 1);
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_dashboard_stats_empty() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.dashboard_stats_on("2024-06-01", "2024-07-01").unwrap();
        assert_eq!(stats.units_in_stock, 0);
        assert_eq!(stats.total_available, 0.0);
    }

    #[test]
    fn test_expiring_soon_ordering() {
        let db = Database::open_in_memory().unwrap();
        seed_unit(&db, 5.0, "2020-02-01");
        seed_unit(&db, 5.0, "2020-01-01");
        seed_unit(&db, 5.0, "2099-01-01"); // far future, outside horizon

        let soon = db.expiring_soon(365, 10).unwrap();
        assert_eq!(soon.len(), 2);
        assert_eq!(soon[0].expiry_date, "2020-01-01");
        assert_eq!(soon[1].expiry_date, "2020-02-01");
    }
}
