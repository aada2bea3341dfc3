//! Reconciles unbilled tracked time into invoices.
//!
//! Unbilled entries are folded into [`BillingGroup`]s keyed by client and
//! contract, priced under the contract's [`PricingModel`], and written as an
//! invoice whose consumed entries receive the `[Invoiced: <number>]` notes
//! marker so later runs skip them.
//!
//! The read-then-mark sequence assumes a single writer per database. The store
//! writes each invoice atomically, but two processes can still select the same
//! entries before either commits.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_domain::{
    append_invoiced_marker, normalize_currency, InvoiceStatus, PricingModel, TimeEntry,
};

use crate::{
    BillingStore, CoreError, CoreResult, EntryMark, InvoiceDraft, InvoiceNumberGenerator,
    LineItemDraft, UnbilledRow,
};

/// Billing unit identity. A missing contract forms a client-only group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
}

/// Unbilled entries sharing a client and contract, with the contract's pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingGroup {
    pub key: GroupKey,
    pub client_name: String,
    pub contract_name: String,
    pub pricing_model: PricingModel,
    pub hourly_rate: Option<f64>,
    pub fixed_price: Option<f64>,
    pub currency: String,
    pub total_hours: f64,
    /// Chronological.
    pub entries: Vec<TimeEntry>,
}

impl BillingGroup {
    fn from_row(key: GroupKey, row: &UnbilledRow) -> Self {
        Self {
            key,
            client_name: row.client_name.clone(),
            contract_name: row.contract_name.clone(),
            pricing_model: row.pricing_model,
            hourly_rate: row.hourly_rate,
            fixed_price: row.fixed_price,
            currency: row.currency(),
            total_hours: 0.0,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, entry: TimeEntry) {
        if let Some(hours) = entry.hours {
            self.total_hours += hours;
        }
        self.entries.push(entry);
    }

    pub fn client_id(&self) -> Uuid {
        self.key.client_id
    }

    pub fn contract_id(&self) -> Option<Uuid> {
        self.key.contract_id
    }

    /// First and last entry dates, if the group has entries.
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.entries.first()?.start_time.date_naive();
        let last = self.entries.last()?.start_time.date_naive();
        Some((first, last))
    }

    pub fn label(&self) -> String {
        if self.contract_name.is_empty() {
            self.client_name.clone()
        } else {
            format!("{} / {}", self.client_name, self.contract_name)
        }
    }
}

/// Issuing company and dates applied to every invoice of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTerms {
    pub company_id: Uuid,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl InvoiceTerms {
    /// Terms due `payment_terms_days` after `issued_date`.
    pub fn net(company_id: Uuid, issued_date: NaiveDate, payment_terms_days: u32) -> Self {
        Self {
            company_id,
            issued_date,
            due_date: issued_date + Duration::days(i64::from(payment_terms_days)),
        }
    }
}

/// Invoice created by a billing run.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub invoice_id: Uuid,
    pub number: String,
    pub key: GroupKey,
    pub client_name: String,
    pub amount: f64,
    pub currency: String,
}

/// Group that could not be invoiced during a batch run.
#[derive(Debug)]
pub struct GroupFailure {
    pub key: GroupKey,
    pub label: String,
    pub error: CoreError,
}

/// Outcome of [`BillingService::generate_invoices_for_all_unbilled_clients`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub created: Vec<CreatedInvoice>,
    pub failures: Vec<GroupFailure>,
}

impl BatchReport {
    pub fn invoice_ids(&self) -> Vec<Uuid> {
        self.created.iter().map(|created| created.invoice_id).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Stateless helpers implementing the unbilled-time reconciliation engine.
pub struct BillingService;

impl BillingService {
    /// Lists every unbilled group, ordered by client then contract.
    pub fn list_unbilled_groups(store: &dyn BillingStore) -> CoreResult<Vec<BillingGroup>> {
        let rows = store.unbilled_rows(None)?;
        debug!(rows = rows.len(), "loaded unbilled rows");
        Ok(Self::group_rows(rows))
    }

    /// Lists the unbilled groups of a single client.
    pub fn list_unbilled_groups_for_client(
        store: &dyn BillingStore,
        client_id: Uuid,
    ) -> CoreResult<Vec<BillingGroup>> {
        let rows = store.unbilled_rows(Some(client_id))?;
        Ok(Self::group_rows(rows)
            .into_iter()
            .filter(|group| group.client_id() == client_id)
            .collect())
    }

    /// Folds query rows into groups. Groups without tracked hours are dropped.
    pub fn group_rows(rows: Vec<UnbilledRow>) -> Vec<BillingGroup> {
        let mut groups: BTreeMap<GroupKey, BillingGroup> = BTreeMap::new();
        for row in rows {
            let key = GroupKey {
                client_id: row.client_id,
                contract_id: row.contract_id,
            };
            groups
                .entry(key)
                .or_insert_with(|| BillingGroup::from_row(key, &row))
                .push(row.to_entry());
        }

        groups
            .into_values()
            .filter_map(|mut group| {
                if group.total_hours <= 0.0 {
                    debug!(group = %group.label(), "dropping group without tracked hours");
                    return None;
                }
                group.entries.sort_by_key(|entry| entry.start_time);
                Some(group)
            })
            .collect()
    }

    /// Prices a group. An amount of zero means the group cannot be invoiced.
    pub fn compute_amount(group: &BillingGroup) -> (f64, String) {
        let currency = normalize_currency(Some(&group.currency));
        let amount = match (group.pricing_model, group.fixed_price, group.hourly_rate) {
            (PricingModel::FixedPrice, Some(price), _) => price,
            (PricingModel::Hourly, _, Some(rate)) => group.total_hours * rate,
            _ => 0.0,
        };
        (amount, currency)
    }

    /// Builds the invoice header, line items and entry marks for a group
    /// without touching the store.
    pub fn build_invoice_draft(
        group: &BillingGroup,
        company_id: Uuid,
        invoice_number: &str,
        issued_date: NaiveDate,
        due_date: NaiveDate,
    ) -> CoreResult<InvoiceDraft> {
        if group.entries.is_empty() {
            return Err(CoreError::NoUnbilledWork(group.label()));
        }
        let invoice_number = invoice_number.trim();
        if invoice_number.is_empty() {
            return Err(CoreError::Validation("invoice number is empty".into()));
        }
        if due_date < issued_date {
            return Err(CoreError::Validation(format!(
                "due date {due_date} is before issue date {issued_date}"
            )));
        }
        let (amount, currency) = Self::compute_amount(group);
        if amount <= 0.0 {
            return Err(Self::no_rate_error(group));
        }

        let line_items = match group.pricing_model {
            PricingModel::FixedPrice => vec![Self::fixed_price_item(group, amount)],
            _ => Self::hourly_items(group, group.hourly_rate.unwrap_or_default()),
        };
        let marks = group
            .entries
            .iter()
            .map(|entry| EntryMark {
                entry_id: entry.id,
                notes: append_invoiced_marker(entry.notes.as_deref(), invoice_number),
            })
            .collect();

        let description = if group.contract_name.is_empty() {
            format!("Services for {}", group.client_name)
        } else {
            format!("Services for {} ({})", group.client_name, group.contract_name)
        };

        Ok(InvoiceDraft {
            number: invoice_number.to_string(),
            company_id,
            client_id: group.client_id(),
            amount,
            currency,
            description,
            status: InvoiceStatus::Pending,
            issued_date,
            due_date,
            line_items,
            marks,
        })
    }

    /// Creates one invoice for `group` and marks its entries as billed.
    pub fn generate_invoice_from_group(
        store: &dyn BillingStore,
        group: &BillingGroup,
        company_id: Uuid,
        invoice_number: &str,
        issued_date: NaiveDate,
        due_date: NaiveDate,
    ) -> CoreResult<Uuid> {
        let draft =
            Self::build_invoice_draft(group, company_id, invoice_number, issued_date, due_date)?;
        if !store.company_exists(company_id)? {
            return Err(CoreError::NotFound(format!("company {company_id}")));
        }
        let invoice_id = store.record_invoice(&draft)?;
        info!(
            invoice = %draft.number,
            client = %group.client_name,
            amount = draft.amount,
            currency = %draft.currency,
            entries = draft.marks.len(),
            "invoice created"
        );
        Ok(invoice_id)
    }

    /// Invoices every unbilled group of one client. Fails fast, and checks every
    /// group's pricing before writing anything.
    pub fn generate_invoices_for_client(
        store: &dyn BillingStore,
        numbers: &dyn InvoiceNumberGenerator,
        client_id: Uuid,
        terms: &InvoiceTerms,
    ) -> CoreResult<Vec<CreatedInvoice>> {
        let client_name = store
            .client_name(client_id)?
            .ok_or_else(|| CoreError::NotFound(format!("client {client_id}")))?;
        let groups = Self::list_unbilled_groups_for_client(store, client_id)?;
        if groups.is_empty() {
            return Err(CoreError::NoUnbilledWork(client_name));
        }
        if let Some(unpriced) = groups
            .iter()
            .find(|group| Self::compute_amount(group).0 <= 0.0)
        {
            return Err(Self::no_rate_error(unpriced));
        }

        groups
            .iter()
            .map(|group| Self::invoice_group(store, numbers, group, terms))
            .collect()
    }

    /// Invoices every unbilled group. A failing group is recorded in the report
    /// and the run continues with the next one.
    pub fn generate_invoices_for_all_unbilled_clients(
        store: &dyn BillingStore,
        numbers: &dyn InvoiceNumberGenerator,
        terms: &InvoiceTerms,
    ) -> CoreResult<BatchReport> {
        let groups = Self::list_unbilled_groups(store)?;
        let mut report = BatchReport::default();
        for group in &groups {
            match Self::invoice_group(store, numbers, group, terms) {
                Ok(created) => report.created.push(created),
                Err(error) => {
                    warn!(group = %group.label(), %error, "skipping group");
                    report.failures.push(GroupFailure {
                        key: group.key,
                        label: group.label(),
                        error,
                    });
                }
            }
        }
        info!(
            created = report.created.len(),
            failed = report.failures.len(),
            "billing run finished"
        );
        Ok(report)
    }

    fn invoice_group(
        store: &dyn BillingStore,
        numbers: &dyn InvoiceNumberGenerator,
        group: &BillingGroup,
        terms: &InvoiceTerms,
    ) -> CoreResult<CreatedInvoice> {
        let (amount, currency) = Self::compute_amount(group);
        if amount <= 0.0 {
            return Err(Self::no_rate_error(group));
        }
        let number = numbers.generate_invoice_number(&group.client_name, terms.issued_date)?;
        let invoice_id = Self::generate_invoice_from_group(
            store,
            group,
            terms.company_id,
            &number,
            terms.issued_date,
            terms.due_date,
        )?;
        Ok(CreatedInvoice {
            invoice_id,
            number,
            key: group.key,
            client_name: group.client_name.clone(),
            amount,
            currency,
        })
    }

    fn fixed_price_item(group: &BillingGroup, price: f64) -> LineItemDraft {
        let label = match group.period() {
            Some((first, last)) if first == last => format!("Fixed-price services {first}"),
            Some((first, last)) => format!("Fixed-price services {first} to {last}"),
            None => "Fixed-price services".to_string(),
        };
        LineItemDraft {
            label,
            description: Some(format!("{:.2} hours tracked", group.total_hours)),
            quantity: 1.0,
            rate: price,
            amount: price,
        }
    }

    fn hourly_items(group: &BillingGroup, rate: f64) -> Vec<LineItemDraft> {
        group
            .entries
            .iter()
            .map(|entry| {
                let quantity = entry.hours.unwrap_or_default();
                LineItemDraft {
                    label: format!(
                        "{} {}",
                        entry.start_time.format("%Y-%m-%d"),
                        entry.project_label
                    ),
                    description: entry.notes.clone().filter(|notes| !notes.is_empty()),
                    quantity,
                    rate,
                    amount: quantity * rate,
                }
            })
            .collect()
    }

    fn no_rate_error(group: &BillingGroup) -> CoreError {
        let detail = match group.pricing_model {
            PricingModel::FixedPrice => "fixed-price contract has no price",
            PricingModel::Hourly if group.contract_id().is_none() => "entries have no contract",
            PricingModel::Hourly => "hourly contract has no rate",
            PricingModel::Retainer
                if group.hourly_rate.is_some() || group.fixed_price.is_some() =>
            {
                "retainer rates are not applied to tracked time"
            }
            PricingModel::Retainer => "retainer contracts have no billing rule",
        };
        CoreError::NoRateConfigured(format!("{} ({detail})", group.label()))
    }
}
