//! CRUD operations for companies, clients, contracts, time entries and invoices.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use tally_core::{document_prefix, next_document_number, CoreError, CoreResult, DocumentKind};
use tally_domain::{
    normalize_currency, Client, Company, Contract, Invoice, LineItem, PricingModel, TimeEntry,
};

use crate::{store_err, SqliteStore};

const TIME_ENTRY_COLUMNS: &str = "id, client_id, contract_id, project_label, start_time, end_time,
     duration_seconds, hours, billable, notes, deleted";

const CONTRACT_COLUMNS: &str =
    "id, client_id, number, name, pricing_model, hourly_rate, fixed_price, currency";

const INVOICE_COLUMNS: &str = "i.id, i.number, i.company_id, r.client_id, i.amount, i.currency,
     i.description, i.status, i.issued_date, i.due_date";

impl SqliteStore {
    // =========================================================================
    // Companies
    // =========================================================================

    pub fn add_company(&self, company: &Company) -> CoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO companies (id, name) VALUES (?1, ?2)",
                params![company.id, company.name.trim()],
            )
            .map_err(store_err("insert company"))?;
            Ok(())
        })
    }

    pub fn list_companies(&self) -> CoreResult<Vec<Company>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM companies ORDER BY name")
                .map_err(store_err("prepare company listing"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Company {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .map_err(store_err("list companies"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read company"))
        })
    }

    pub fn find_company_by_name(&self, name: &str) -> CoreResult<Option<Company>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name FROM companies WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                |row| {
                    Ok(Company {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(store_err("find company"))
        })
    }

    // =========================================================================
    // Clients
    // =========================================================================

    pub fn add_client(&self, client: &Client) -> CoreResult<()> {
        if client.name.trim().is_empty() {
            return Err(CoreError::Validation("client name is empty".into()));
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO clients (id, name, email, currency) VALUES (?1, ?2, ?3, ?4)",
                params![
                    client.id,
                    client.name.trim(),
                    client.email,
                    normalize_currency(Some(&client.currency))
                ],
            )
            .map_err(store_err("insert client"))?;
            Ok(())
        })
    }

    pub fn list_clients(&self) -> CoreResult<Vec<Client>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, email, currency FROM clients ORDER BY name")
                .map_err(store_err("prepare client listing"))?;
            let rows = stmt
                .query_map([], client_from_row)
                .map_err(store_err("list clients"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read client"))
        })
    }

    pub fn client(&self, id: Uuid) -> CoreResult<Option<Client>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, currency FROM clients WHERE id = ?1",
                params![id],
                client_from_row,
            )
            .optional()
            .map_err(store_err("get client"))
        })
    }

    pub fn find_client_by_name(&self, name: &str) -> CoreResult<Option<Client>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, currency FROM clients WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                client_from_row,
            )
            .optional()
            .map_err(store_err("find client"))
        })
    }

    // =========================================================================
    // Contracts
    // =========================================================================

    /// Stores a contract, assigning a `CTR-…` number when none is set.
    pub fn add_contract(
        &self,
        contract: &Contract,
        reference_date: NaiveDate,
    ) -> CoreResult<Contract> {
        if contract.hourly_rate.is_some_and(|rate| rate < 0.0)
            || contract.fixed_price.is_some_and(|price| price < 0.0)
        {
            return Err(CoreError::Validation("contract rates must not be negative".into()));
        }
        let client = self
            .client(contract.client_id)?
            .ok_or_else(|| CoreError::NotFound(format!("client {}", contract.client_id)))?;

        let mut stored = contract.clone();
        stored.currency = normalize_currency(Some(&contract.currency));
        if stored.number.trim().is_empty() {
            let prefix = document_prefix(DocumentKind::Contract, &client.name, reference_date);
            let existing = self.numbers_with_prefix(DocumentKind::Contract, &prefix)?;
            stored.number = next_document_number(&prefix, existing.iter().map(String::as_str));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO contracts (id, client_id, number, name, pricing_model, hourly_rate,
                 fixed_price, currency) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    stored.id,
                    stored.client_id,
                    stored.number,
                    stored.name.trim(),
                    stored.pricing_model.as_str(),
                    stored.hourly_rate,
                    stored.fixed_price,
                    stored.currency
                ],
            )
            .map_err(store_err("insert contract"))?;
            Ok(())
        })?;
        info!(contract = %stored.number, client = %client.name, "contract added");
        Ok(stored)
    }

    pub fn list_contracts(&self, client_id: Option<Uuid>) -> CoreResult<Vec<Contract>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts
                 WHERE (?1 IS NULL OR client_id = ?1) ORDER BY number"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(store_err("prepare contract listing"))?;
            let rows = stmt
                .query_map(params![client_id], contract_from_row)
                .map_err(store_err("list contracts"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read contract"))
        })
    }

    pub fn find_contract(
        &self,
        client_id: Uuid,
        name_or_number: &str,
    ) -> CoreResult<Option<Contract>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts
                 WHERE client_id = ?1 AND (name = ?2 COLLATE NOCASE OR number = ?2)
                 ORDER BY number LIMIT 1"
            );
            conn.query_row(&sql, params![client_id, name_or_number.trim()], contract_from_row)
                .optional()
                .map_err(store_err("find contract"))
        })
    }

    // =========================================================================
    // Time entries
    // =========================================================================

    pub fn add_time_entry(&self, entry: &TimeEntry) -> CoreResult<()> {
        if let (Some(contract_id), Some(client_id)) = (entry.contract_id, entry.client_id) {
            self.ensure_contract_belongs(contract_id, client_id)?;
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO time_entries (id, client_id, contract_id, project_label, start_time,
                 end_time, duration_seconds, hours, billable, notes, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    entry.id,
                    entry.client_id,
                    entry.contract_id,
                    entry.project_label,
                    entry.start_time,
                    entry.end_time,
                    entry.duration_seconds,
                    entry.hours,
                    entry.billable,
                    entry.notes,
                    entry.deleted
                ],
            )
            .map_err(store_err("insert time entry"))?;
            Ok(())
        })
    }

    pub fn time_entry(&self, id: Uuid) -> CoreResult<Option<TimeEntry>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE id = ?1");
            conn.query_row(&sql, params![id], time_entry_from_row)
                .optional()
                .map_err(store_err("get time entry"))
        })
    }

    /// Lists non-deleted entries, newest first.
    pub fn list_time_entries(&self, client_id: Option<Uuid>) -> CoreResult<Vec<TimeEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries
                 WHERE deleted = 0 AND (?1 IS NULL OR client_id = ?1)
                 ORDER BY start_time DESC"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(store_err("prepare time entry listing"))?;
            let rows = stmt
                .query_map(params![client_id], time_entry_from_row)
                .map_err(store_err("list time entries"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read time entry"))
        })
    }

    /// Opens a running session. Only one session may run at a time.
    pub fn start_tracking(
        &self,
        client_id: Option<Uuid>,
        contract_id: Option<Uuid>,
        project_label: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<TimeEntry> {
        if let Some(running) = self.running_entry()? {
            return Err(CoreError::Validation(format!(
                "already tracking `{}` since {}",
                running.project_label,
                running.start_time.format("%Y-%m-%d %H:%M")
            )));
        }
        let entry = TimeEntry::started(client_id, contract_id, project_label, now);
        self.add_time_entry(&entry)?;
        Ok(entry)
    }

    /// Closes the running session at `now`.
    pub fn stop_tracking(&self, now: DateTime<Utc>) -> CoreResult<TimeEntry> {
        let mut entry = self
            .running_entry()?
            .ok_or_else(|| CoreError::NotFound("running time entry".into()))?;
        entry.stop(now);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE time_entries SET end_time = ?1, duration_seconds = ?2, hours = ?3
                 WHERE id = ?4",
                params![entry.end_time, entry.duration_seconds, entry.hours, entry.id],
            )
            .map_err(store_err("stop time entry"))?;
            Ok(())
        })?;
        Ok(entry)
    }

    pub fn running_entry(&self) -> CoreResult<Option<TimeEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries
                 WHERE end_time IS NULL AND deleted = 0
                 ORDER BY start_time DESC LIMIT 1"
            );
            conn.query_row(&sql, [], time_entry_from_row)
                .optional()
                .map_err(store_err("find running entry"))
        })
    }

    pub fn soft_delete_time_entry(&self, id: Uuid) -> CoreResult<()> {
        let updated = self.with_conn(|conn| {
            conn.execute(
                "UPDATE time_entries SET deleted = 1 WHERE id = ?1 AND deleted = 0",
                params![id],
            )
            .map_err(store_err("delete time entry"))
        })?;
        if updated == 0 {
            return Err(CoreError::NotFound(format!("time entry {id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    pub fn list_invoices(&self) -> CoreResult<Vec<Invoice>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices i
                 JOIN invoice_recipients r ON r.invoice_id = i.id
                 ORDER BY i.issued_date, i.number"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(store_err("prepare invoice listing"))?;
            let rows = stmt
                .query_map([], invoice_from_row)
                .map_err(store_err("list invoices"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read invoice"))
        })
    }

    pub fn invoice(&self, id: Uuid) -> CoreResult<Option<Invoice>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices i
                 JOIN invoice_recipients r ON r.invoice_id = i.id
                 WHERE i.id = ?1"
            );
            conn.query_row(&sql, params![id], invoice_from_row)
                .optional()
                .map_err(store_err("get invoice"))
        })
    }

    pub fn invoice_by_number(&self, number: &str) -> CoreResult<Option<Invoice>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices i
                 JOIN invoice_recipients r ON r.invoice_id = i.id
                 WHERE i.number = ?1 COLLATE NOCASE"
            );
            conn.query_row(&sql, params![number.trim()], invoice_from_row)
                .optional()
                .map_err(store_err("find invoice"))
        })
    }

    pub fn invoice_line_items(&self, invoice_id: Uuid) -> CoreResult<Vec<LineItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, invoice_id, label, description, quantity, rate, amount
                     FROM invoice_line_items WHERE invoice_id = ?1 ORDER BY position",
                )
                .map_err(store_err("prepare line item listing"))?;
            let rows = stmt
                .query_map(params![invoice_id], |row| {
                    Ok(LineItem {
                        id: row.get(0)?,
                        invoice_id: row.get(1)?,
                        label: row.get(2)?,
                        description: row.get(3)?,
                        quantity: row.get(4)?,
                        rate: row.get(5)?,
                        amount: row.get(6)?,
                    })
                })
                .map_err(store_err("list line items"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read line item"))
        })
    }

    pub(crate) fn numbers_with_prefix(
        &self,
        kind: DocumentKind,
        prefix: &str,
    ) -> CoreResult<Vec<String>> {
        let table = match kind {
            DocumentKind::Invoice => "invoices",
            DocumentKind::Contract => "contracts",
        };
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT number FROM {table} WHERE substr(number, 1, length(?1)) = ?1"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(store_err("prepare number lookup"))?;
            let rows = stmt
                .query_map(params![prefix], |row| row.get(0))
                .map_err(store_err("list document numbers"))?;
            rows.collect::<Result<Vec<String>, _>>()
                .map_err(store_err("read document number"))
        })
    }

    fn ensure_contract_belongs(&self, contract_id: Uuid, client_id: Uuid) -> CoreResult<()> {
        let owner: Option<Uuid> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT client_id FROM contracts WHERE id = ?1",
                params![contract_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("get contract owner"))
        })?;
        match owner {
            None => Err(CoreError::NotFound(format!("contract {contract_id}"))),
            Some(owner) if owner != client_id => Err(CoreError::Validation(format!(
                "contract {contract_id} belongs to another client"
            ))),
            Some(_) => Ok(()),
        }
    }
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        currency: row.get(3)?,
    })
}

fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        id: row.get(0)?,
        client_id: row.get(1)?,
        number: row.get(2)?,
        name: row.get(3)?,
        pricing_model: pricing_model_at(row, 4)?,
        hourly_rate: row.get(5)?,
        fixed_price: row.get(6)?,
        currency: row.get(7)?,
    })
}

fn time_entry_from_row(row: &Row<'_>) -> rusqlite::Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.get(0)?,
        client_id: row.get(1)?,
        contract_id: row.get(2)?,
        project_label: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        duration_seconds: row.get(6)?,
        hours: row.get(7)?,
        billable: row.get(8)?,
        notes: row.get(9)?,
        deleted: row.get(10)?,
    })
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let status: String = row.get(7)?;
    Ok(Invoice {
        id: row.get(0)?,
        number: row.get(1)?,
        company_id: row.get(2)?,
        client_id: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        description: row.get(6)?,
        status: status.parse().map_err(|message: String| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, message.into())
        })?,
        issued_date: row.get(8)?,
        due_date: row.get(9)?,
    })
}

/// Parses the pricing model stored in column `index`.
pub(crate) fn pricing_model_at(row: &Row<'_>, index: usize) -> rusqlite::Result<PricingModel> {
    let raw: String = row.get(index)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}
