//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use tally_core::CoreResult;

use crate::store_err;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

const TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS clients (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email TEXT,
    currency TEXT NOT NULL DEFAULT 'USD'
);

CREATE TABLE IF NOT EXISTS contracts (
    id BLOB PRIMARY KEY,
    client_id BLOB NOT NULL REFERENCES clients(id),
    number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    pricing_model TEXT NOT NULL DEFAULT 'hourly',
    hourly_rate REAL,
    fixed_price REAL,
    currency TEXT NOT NULL DEFAULT 'USD'
);

CREATE TABLE IF NOT EXISTS time_entries (
    id BLOB PRIMARY KEY,
    client_id BLOB REFERENCES clients(id),
    contract_id BLOB REFERENCES contracts(id),
    project_label TEXT NOT NULL DEFAULT '',
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration_seconds INTEGER,
    hours REAL,
    billable INTEGER NOT NULL DEFAULT 1,
    notes TEXT,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS invoices (
    id BLOB PRIMARY KEY,
    number TEXT NOT NULL UNIQUE,
    company_id BLOB NOT NULL REFERENCES companies(id),
    amount REAL NOT NULL,
    currency TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    issued_date TEXT NOT NULL,
    due_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice_recipients (
    invoice_id BLOB NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    client_id BLOB NOT NULL REFERENCES clients(id),
    PRIMARY KEY (invoice_id, client_id)
);

CREATE TABLE IF NOT EXISTS invoice_line_items (
    id BLOB PRIMARY KEY,
    invoice_id BLOB NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    description TEXT,
    quantity REAL NOT NULL,
    rate REAL NOT NULL,
    amount REAL NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_time_entries_billing
    ON time_entries(client_id, contract_id, start_time);
CREATE INDEX IF NOT EXISTS idx_line_items_invoice
    ON invoice_line_items(invoice_id, position);
"#;

/// Creates or migrates the schema to [`SCHEMA_VERSION`].
pub fn init_schema(conn: &Connection) -> CoreResult<()> {
    let current = schema_version(conn)?;
    if current == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(TABLES).map_err(store_err("create tables"))?;
        conn.execute_batch(INDEXES).map_err(store_err("create indexes"))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Returns the stored schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> CoreResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(store_err("create schema_version table"))?;
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(store_err("read schema version"))?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> CoreResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(store_err("clear schema version"))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(store_err("write schema version"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
