use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use tally_core::{
    document_prefix, next_document_number, BillingStore, CoreError, CoreResult, DocumentKind,
    InvoiceDraft, InvoiceNumberGenerator, UnbilledRow,
};
use tally_domain::INVOICED_MARKER;

use crate::records::pricing_model_at;
use crate::{store_err, SqliteStore};

/// Candidate entries: finished, billable, live, assigned to a client and not
/// yet carrying the billed marker. Entries without a contract fall back to
/// hourly pricing with no rate.
const UNBILLED_SQL: &str = "
    SELECT te.id, te.client_id, te.contract_id, te.project_label, te.start_time,
           te.end_time, te.duration_seconds, te.hours, te.notes,
           c.name,
           COALESCE(ct.name, ''),
           COALESCE(ct.pricing_model, 'hourly'),
           ct.hourly_rate,
           ct.fixed_price,
           COALESCE(ct.currency, 'USD')
    FROM time_entries te
    JOIN clients c ON c.id = te.client_id
    LEFT JOIN contracts ct ON ct.id = te.contract_id
    WHERE te.billable = 1
      AND te.deleted = 0
      AND te.end_time IS NOT NULL
      AND te.hours IS NOT NULL
      AND (te.notes IS NULL OR instr(te.notes, ?2) = 0)
      AND (?1 IS NULL OR te.client_id = ?1)
    ORDER BY te.client_id, te.contract_id, te.start_time";

impl BillingStore for SqliteStore {
    fn unbilled_rows(&self, client_id: Option<Uuid>) -> CoreResult<Vec<UnbilledRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(UNBILLED_SQL)
                .map_err(store_err("prepare unbilled query"))?;
            let rows = stmt
                .query_map(params![client_id, INVOICED_MARKER], |row| {
                    Ok(UnbilledRow {
                        entry_id: row.get(0)?,
                        client_id: row.get(1)?,
                        contract_id: row.get(2)?,
                        project_label: row.get(3)?,
                        start_time: row.get(4)?,
                        end_time: row.get(5)?,
                        duration_seconds: row.get(6)?,
                        hours: row.get(7)?,
                        notes: row.get(8)?,
                        client_name: row.get(9)?,
                        contract_name: row.get(10)?,
                        pricing_model: pricing_model_at(row, 11)?,
                        hourly_rate: row.get(12)?,
                        fixed_price: row.get(13)?,
                        currency: row.get(14)?,
                    })
                })
                .map_err(store_err("query unbilled entries"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(store_err("read unbilled entry"))
        })
    }

    fn company_exists(&self, company_id: Uuid) -> CoreResult<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM companies WHERE id = ?1",
                    params![company_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("check company"))?;
            Ok(found.is_some())
        })
    }

    fn client_name(&self, client_id: Uuid) -> CoreResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name FROM clients WHERE id = ?1",
                params![client_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("get client name"))
        })
    }

    /// Writes the whole invoice in one immediate transaction. Dropping the
    /// transaction on any error rolls every statement back.
    fn record_invoice(&self, draft: &InvoiceDraft) -> CoreResult<Uuid> {
        let invoice_id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err("begin invoice transaction"))?;

            tx.execute(
                "INSERT INTO invoices (id, number, company_id, amount, currency, description,
                 status, issued_date, due_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    invoice_id,
                    draft.number,
                    draft.company_id,
                    draft.amount,
                    draft.currency,
                    draft.description,
                    draft.status.as_str(),
                    draft.issued_date,
                    draft.due_date
                ],
            )
            .map_err(store_err("insert invoice"))?;

            tx.execute(
                "INSERT INTO invoice_recipients (invoice_id, client_id) VALUES (?1, ?2)",
                params![invoice_id, draft.client_id],
            )
            .map_err(store_err("insert invoice recipient"))?;

            for (position, item) in draft.line_items.iter().enumerate() {
                tx.execute(
                    "INSERT INTO invoice_line_items (id, invoice_id, position, label, description,
                     quantity, rate, amount) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        Uuid::new_v4(),
                        invoice_id,
                        position as i64,
                        item.label,
                        item.description,
                        item.quantity,
                        item.rate,
                        item.amount
                    ],
                )
                .map_err(store_err("insert line item"))?;
            }

            for mark in &draft.marks {
                let updated = tx
                    .execute(
                        "UPDATE time_entries SET notes = ?1
                         WHERE id = ?2 AND (notes IS NULL OR instr(notes, ?3) = 0)",
                        params![mark.notes, mark.entry_id, INVOICED_MARKER],
                    )
                    .map_err(store_err("mark time entry"))?;
                if updated == 0 {
                    return Err(CoreError::AlreadyInvoiced(mark.entry_id));
                }
            }

            tx.commit().map_err(store_err("commit invoice"))?;
            debug!(invoice = %draft.number, items = draft.line_items.len(), "invoice recorded");
            Ok(invoice_id)
        })
    }
}

impl InvoiceNumberGenerator for SqliteStore {
    fn generate_invoice_number(
        &self,
        client_name: &str,
        reference_date: NaiveDate,
    ) -> CoreResult<String> {
        let prefix = document_prefix(DocumentKind::Invoice, client_name, reference_date);
        let existing = self.numbers_with_prefix(DocumentKind::Invoice, &prefix)?;
        Ok(next_document_number(
            &prefix,
            existing.iter().map(String::as_str),
        ))
    }
}
