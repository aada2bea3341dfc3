use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use tally_domain::{normalize_currency, InvoiceStatus, PricingModel, TimeEntry};

use crate::CoreResult;

/// One candidate row of the unbilled-time query: a time entry joined with its
/// client name and, when present, its contract's pricing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UnbilledRow {
    pub entry_id: Uuid,
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub project_label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub hours: Option<f64>,
    pub notes: Option<String>,
    pub client_name: String,
    /// Empty when the entry has no contract.
    pub contract_name: String,
    /// `Hourly` when the entry has no contract.
    pub pricing_model: PricingModel,
    pub hourly_rate: Option<f64>,
    pub fixed_price: Option<f64>,
    /// `USD` when the entry has no contract.
    pub currency: String,
}

impl UnbilledRow {
    /// Rebuilds the time entry carried by this row.
    pub fn to_entry(&self) -> TimeEntry {
        TimeEntry {
            id: self.entry_id,
            client_id: Some(self.client_id),
            contract_id: self.contract_id,
            project_label: self.project_label.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
            hours: self.hours,
            billable: true,
            notes: self.notes.clone(),
            deleted: false,
        }
    }

    pub fn currency(&self) -> String {
        normalize_currency(Some(&self.currency))
    }
}

/// Line item ready to be written under a new invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemDraft {
    pub label: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

/// New notes value for a consumed time entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMark {
    pub entry_id: Uuid,
    pub notes: String,
}

/// Everything the store writes when an invoice is created from a billing group.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub number: String,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub status: InvoiceStatus,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<LineItemDraft>,
    pub marks: Vec<EntryMark>,
}

/// Persistence seam consumed by [`crate::BillingService`].
pub trait BillingStore: Send + Sync {
    /// Returns unbilled rows ordered by client, contract, then start time.
    /// `client_id` narrows the query to a single client.
    fn unbilled_rows(&self, client_id: Option<Uuid>) -> CoreResult<Vec<UnbilledRow>>;

    fn company_exists(&self, company_id: Uuid) -> CoreResult<bool>;

    fn client_name(&self, client_id: Uuid) -> CoreResult<Option<String>>;

    /// Writes the invoice header, recipient link, line items and entry marks.
    /// Returns the new invoice id.
    fn record_invoice(&self, draft: &InvoiceDraft) -> CoreResult<Uuid>;
}
