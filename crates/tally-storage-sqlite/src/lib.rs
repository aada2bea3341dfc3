//! tally-storage-sqlite
//!
//! SQLite persistence for Tally: clients, companies, contracts, time entries
//! and invoices. Implements the billing store and invoice numbering seams of
//! tally-core.

mod billing;
mod records;
pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use tally_core::{CoreError, CoreResult};

/// SQLite database holding all billing records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database file at `path`.
    pub fn open(path: &Path) -> CoreResult<Self> {
        info!("Opening SQLite database at {:?}", path);
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| CoreError::Store(format!("create {}: {err}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(store_err("open database"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(store_err("set pragmas"))?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        debug!("Opening in-memory SQLite database");
        let conn = Connection::open_in_memory().map_err(store_err("open in-memory database"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(store_err("enable foreign keys"))?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Connection) -> CoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|err| CoreError::Store(format!("lock poisoned: {err}")))?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Connection) -> CoreResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|err| CoreError::Store(format!("lock poisoned: {err}")))?;
        f(&mut conn)
    }
}

/// Wraps a rusqlite error with the failing step.
pub(crate) fn store_err(context: &'static str) -> impl Fn(rusqlite::Error) -> CoreError {
    move |err| CoreError::Store(format!("{context}: {err}"))
}
