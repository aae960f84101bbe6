//! SQLite schema definition.

/// Complete database schema for medcab.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Drugs
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    drug_id TEXT PRIMARY KEY,
    ndc_id TEXT UNIQUE,                          -- NULL for hand-entered meds
    medication_name TEXT NOT NULL,
    strength REAL NOT NULL,
    strength_unit TEXT NOT NULL,
    form TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Profile fallback lookup (name + strength + unit)
CREATE INDEX IF NOT EXISTS idx_drugs_profile
    ON drugs(medication_name, strength, strength_unit);

-- FTS5 virtual table for medication name search
CREATE VIRTUAL TABLE IF NOT EXISTS drugs_fts USING fts5(
    drug_id,
    medication_name,
    ndc_id,
    content='drugs',
    content_rowid='rowid'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS drugs_ai AFTER INSERT ON drugs BEGIN
    INSERT INTO drugs_fts(rowid, drug_id, medication_name, ndc_id)
    VALUES (new.rowid, new.drug_id, new.medication_name, new.ndc_id);
END;

CREATE TRIGGER IF NOT EXISTS drugs_ad AFTER DELETE ON drugs BEGIN
    INSERT INTO drugs_fts(drugs_fts, rowid, drug_id, medication_name, ndc_id)
    VALUES ('delete', old.rowid, old.drug_id, old.medication_name, old.ndc_id);
END;

CREATE TRIGGER IF NOT EXISTS drugs_au AFTER UPDATE ON drugs BEGIN
    INSERT INTO drugs_fts(drugs_fts, rowid, drug_id, medication_name, ndc_id)
    VALUES ('delete', old.rowid, old.drug_id, old.medication_name, old.ndc_id);
    INSERT INTO drugs_fts(rowid, drug_id, medication_name, ndc_id)
    VALUES (new.rowid, new.drug_id, new.medication_name, new.ndc_id);
END;

-- ============================================================================
-- Lots
-- ============================================================================

CREATE TABLE IF NOT EXISTS lots (
    lot_id TEXT PRIMARY KEY,
    lot_code TEXT NOT NULL,
    source TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_lots_code ON lots(lot_code);

-- ============================================================================
-- Inventory Units
-- ============================================================================

-- Units are never deleted; checkout drives available_quantity toward zero.
-- The CHECK constraints make a negative or over-total available quantity
-- unrepresentable, so a racing decrement cannot corrupt stock.
CREATE TABLE IF NOT EXISTS inventory_units (
    unit_id TEXT PRIMARY KEY,
    drug_id TEXT NOT NULL REFERENCES drugs(drug_id),
    lot_id TEXT REFERENCES lots(lot_id),
    total_quantity REAL NOT NULL CHECK (total_quantity >= 0),
    available_quantity REAL NOT NULL CHECK (available_quantity >= 0),
    expiry_date TEXT NOT NULL,                   -- YYYY-MM-DD
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (available_quantity <= total_quantity)
);

CREATE INDEX IF NOT EXISTS idx_units_drug ON inventory_units(drug_id);
CREATE INDEX IF NOT EXISTS idx_units_lot ON inventory_units(lot_id);
-- FEFO scan order
CREATE INDEX IF NOT EXISTS idx_units_fefo
    ON inventory_units(drug_id, expiry_date, created_at);

-- ============================================================================
-- Transactions (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS transactions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,       -- chain order
    transaction_id TEXT NOT NULL UNIQUE,
    unit_id TEXT NOT NULL REFERENCES inventory_units(unit_id),
    kind TEXT NOT NULL CHECK (kind IN ('check_in', 'check_out', 'adjust')),
    quantity REAL NOT NULL,
    performed_by TEXT NOT NULL,
    patient_ref TEXT,
    notes TEXT,
    prev_hash TEXT NOT NULL,                     -- '' for the first entry
    entry_hash TEXT NOT NULL UNIQUE,             -- sha256(prev_hash || payload)
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only: history is corrected by compensating transactions, never edits
CREATE TRIGGER IF NOT EXISTS transactions_no_update BEFORE UPDATE ON transactions
BEGIN
    SELECT RAISE(ABORT, 'transactions are append-only');
END;

CREATE TRIGGER IF NOT EXISTS transactions_no_delete BEFORE DELETE ON transactions
BEGIN
    SELECT RAISE(ABORT, 'transactions are append-only');
END;

CREATE INDEX IF NOT EXISTS idx_transactions_unit ON transactions(unit_id);
CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at);
"#;
