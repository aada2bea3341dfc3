use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    BillingGroup, BillingService, BillingStore, CoreError, CoreResult, InvoiceDraft,
    InvoiceNumberGenerator, InvoiceTerms, UnbilledRow,
};
use tally_domain::{has_invoiced_marker, InvoiceStatus, PricingModel};

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<UnbilledRow>>,
    clients: HashMap<Uuid, String>,
    companies: Vec<Uuid>,
    recorded: Mutex<Vec<InvoiceDraft>>,
}

impl MemoryStore {
    fn with_company(company: Uuid) -> Self {
        Self {
            companies: vec![company],
            ..Self::default()
        }
    }

    fn add_rows(&mut self, rows: Vec<UnbilledRow>) {
        for row in &rows {
            self.clients.insert(row.client_id, row.client_name.clone());
        }
        self.rows.lock().unwrap().extend(rows);
    }

    fn recorded(&self) -> Vec<InvoiceDraft> {
        self.recorded.lock().unwrap().clone()
    }
}

impl BillingStore for MemoryStore {
    fn unbilled_rows(&self, client_id: Option<Uuid>) -> CoreResult<Vec<UnbilledRow>> {
        let rows = self.rows.lock().unwrap();
        let mut selected: Vec<UnbilledRow> = rows
            .iter()
            .filter(|row| client_id.map_or(true, |id| row.client_id == id))
            .filter(|row| row.hours.is_some() && !has_invoiced_marker(row.notes.as_deref()))
            .cloned()
            .collect();
        selected.sort_by_key(|row| (row.client_id, row.contract_id, row.start_time));
        Ok(selected)
    }

    fn company_exists(&self, company_id: Uuid) -> CoreResult<bool> {
        Ok(self.companies.contains(&company_id))
    }

    fn client_name(&self, client_id: Uuid) -> CoreResult<Option<String>> {
        Ok(self.clients.get(&client_id).cloned())
    }

    fn record_invoice(&self, draft: &InvoiceDraft) -> CoreResult<Uuid> {
        let mut rows = self.rows.lock().unwrap();
        for mark in &draft.marks {
            if let Some(row) = rows.iter_mut().find(|row| row.entry_id == mark.entry_id) {
                row.notes = Some(mark.notes.clone());
            }
        }
        self.recorded.lock().unwrap().push(draft.clone());
        Ok(Uuid::new_v4())
    }
}

struct CountingNumbers(Mutex<u32>);

impl InvoiceNumberGenerator for CountingNumbers {
    fn generate_invoice_number(&self, client_name: &str, _date: NaiveDate) -> CoreResult<String> {
        let mut next = self.0.lock().unwrap();
        *next += 1;
        Ok(format!("INV-{client_name}-{next:03}"))
    }
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

struct ContractFixture {
    id: Option<Uuid>,
    model: PricingModel,
    rate: Option<f64>,
    price: Option<f64>,
    currency: &'static str,
}

fn hourly(rate: f64) -> ContractFixture {
    ContractFixture {
        id: Some(Uuid::new_v4()),
        model: PricingModel::Hourly,
        rate: Some(rate),
        price: None,
        currency: "USD",
    }
}

fn fixed(price: f64, currency: &'static str) -> ContractFixture {
    ContractFixture {
        id: Some(Uuid::new_v4()),
        model: PricingModel::FixedPrice,
        rate: None,
        price: Some(price),
        currency,
    }
}

fn row(client: Uuid, name: &str, contract: &ContractFixture, day: u32, hours: f64) -> UnbilledRow {
    UnbilledRow {
        entry_id: Uuid::new_v4(),
        client_id: client,
        contract_id: contract.id,
        project_label: format!("Work on day {day}"),
        start_time: at(day, 9),
        end_time: Some(at(day, 10)),
        duration_seconds: Some((hours * 3600.0) as i64),
        hours: Some(hours),
        notes: None,
        client_name: name.to_string(),
        contract_name: if contract.id.is_some() { "Main".into() } else { String::new() },
        pricing_model: contract.model,
        hourly_rate: contract.rate,
        fixed_price: contract.price,
        currency: contract.currency.to_string(),
    }
}

fn group_with(model: ContractFixture, total_hours: f64) -> BillingGroup {
    let client = Uuid::new_v4();
    let rows = vec![row(client, "Solo", &model, 1, total_hours)];
    BillingService::group_rows(rows).remove(0)
}

#[test]
fn grouping_sums_hours_per_client_and_contract() {
    let acme = Uuid::new_v4();
    let web = hourly(100.0);
    let support = hourly(80.0);
    let rows = vec![
        row(acme, "Acme", &web, 1, 3.0),
        row(acme, "Acme", &web, 2, 2.0),
        row(acme, "Acme", &support, 3, 1.5),
        row(acme, "Acme", &support, 4, 0.5),
        row(acme, "Acme", &web, 5, 4.0),
    ];

    let groups = BillingService::group_rows(rows);

    assert_eq!(groups.len(), 2);
    let web_group = groups
        .iter()
        .find(|group| group.contract_id() == web.id)
        .expect("web group");
    let support_group = groups
        .iter()
        .find(|group| group.contract_id() == support.id)
        .expect("support group");
    assert_eq!(web_group.total_hours, 9.0);
    assert_eq!(web_group.entries.len(), 3);
    assert_eq!(support_group.total_hours, 2.0);
}

#[test]
fn grouping_orders_groups_and_entries() {
    let client = Uuid::new_v4();
    let no_contract = ContractFixture {
        id: None,
        model: PricingModel::Hourly,
        rate: None,
        price: None,
        currency: "USD",
    };
    let contract = hourly(50.0);
    let rows = vec![
        row(client, "Gamma", &contract, 9, 1.0),
        row(client, "Gamma", &contract, 2, 1.0),
        row(client, "Gamma", &no_contract, 4, 1.0),
    ];

    let groups = BillingService::group_rows(rows);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].contract_id(), None, "client-only group sorts first");
    let starts: Vec<_> = groups[1].entries.iter().map(|e| e.start_time).collect();
    assert_eq!(starts, vec![at(2, 9), at(9, 9)]);
}

#[test]
fn grouping_drops_groups_without_hours() {
    let client = Uuid::new_v4();
    let contract = hourly(50.0);
    let mut empty = row(client, "Delta", &contract, 1, 0.0);
    empty.hours = Some(0.0);

    assert!(BillingService::group_rows(vec![empty]).is_empty());
}

#[test]
fn fixed_price_amount_ignores_hours() {
    for hours in [0.1, 45.0, 1000.0] {
        let group = group_with(fixed(5000.0, "USD"), hours);
        let (amount, currency) = BillingService::compute_amount(&group);
        assert_eq!(amount, 5000.0, "hours = {hours}");
        assert_eq!(currency, "USD");
    }
}

#[test]
fn hourly_amount_is_hours_times_rate() {
    let group = group_with(hourly(150.0), 10.5);
    let (amount, _) = BillingService::compute_amount(&group);
    assert_eq!(amount, 1575.0);
    assert_eq!(amount, group.total_hours * 150.0);
}

#[test]
fn unpriced_groups_compute_zero() {
    let retainer = ContractFixture {
        id: Some(Uuid::new_v4()),
        model: PricingModel::Retainer,
        rate: Some(90.0),
        price: None,
        currency: "",
    };
    let group = group_with(retainer, 4.0);
    assert_eq!(BillingService::compute_amount(&group), (0.0, "USD".to_string()));

    let mut missing_rate = hourly(1.0);
    missing_rate.rate = None;
    let group = group_with(missing_rate, 4.0);
    assert_eq!(BillingService::compute_amount(&group).0, 0.0);
}

#[test]
fn retainer_refusal_names_the_actual_reason() {
    let refusal = |rate: Option<f64>| {
        let retainer = ContractFixture {
            id: Some(Uuid::new_v4()),
            model: PricingModel::Retainer,
            rate,
            price: None,
            currency: "USD",
        };
        let group = group_with(retainer, 4.0);
        BillingService::build_invoice_draft(
            &group,
            Uuid::new_v4(),
            "INV-202405-ACME-001",
            date(31),
            date(31),
        )
        .unwrap_err()
        .to_string()
    };

    let with_rate = refusal(Some(90.0));
    assert!(with_rate.contains("retainer rates are not applied"), "{with_rate}");
    assert!(!with_rate.contains("no billing rule"), "{with_rate}");
    assert!(refusal(None).contains("no billing rule"));
}

#[test]
fn hourly_draft_has_one_item_per_entry() {
    let acme = Uuid::new_v4();
    let contract = hourly(100.0);
    let mut first = row(acme, "Acme", &contract, 1, 3.0);
    first.notes = Some("kickoff".into());
    let rows = vec![first, row(acme, "Acme", &contract, 2, 2.0)];
    let group = BillingService::group_rows(rows).remove(0);

    let draft = BillingService::build_invoice_draft(
        &group,
        Uuid::new_v4(),
        "INV-202405-ACME-001",
        date(31),
        date(31),
    )
    .expect("draft");

    assert_eq!(draft.amount, 500.0);
    assert_eq!(draft.currency, "USD");
    assert_eq!(draft.status, InvoiceStatus::Pending);
    assert_eq!(draft.line_items.len(), 2);
    assert!(draft.line_items.iter().all(|item| item.rate == 100.0));
    assert_eq!(draft.line_items[0].label, "2024-05-01 Work on day 1");
    assert_eq!(draft.line_items[0].amount, 300.0);
    assert_eq!(draft.marks[0].notes, "kickoff [Invoiced: INV-202405-ACME-001]");
    assert_eq!(draft.marks[1].notes, "[Invoiced: INV-202405-ACME-001]");
}

#[test]
fn fixed_price_draft_has_single_synthetic_item() {
    let beta = Uuid::new_v4();
    let contract = fixed(2000.0, "EUR");
    let rows = vec![
        row(beta, "Beta", &contract, 3, 10.0),
        row(beta, "Beta", &contract, 10, 12.0),
        row(beta, "Beta", &contract, 17, 8.0),
    ];
    let group = BillingService::group_rows(rows).remove(0);
    assert_eq!(group.total_hours, 30.0);

    let draft =
        BillingService::build_invoice_draft(&group, Uuid::new_v4(), "INV-1", date(31), date(31))
            .expect("draft");

    assert_eq!(draft.amount, 2000.0);
    assert_eq!(draft.currency, "EUR");
    assert_eq!(draft.line_items.len(), 1);
    let item = &draft.line_items[0];
    assert_eq!(item.quantity, 1.0);
    assert_eq!(item.amount, 2000.0);
    assert_eq!(item.label, "Fixed-price services 2024-05-03 to 2024-05-17");
    assert_eq!(item.description.as_deref(), Some("30.00 hours tracked"));
    assert_eq!(draft.marks.len(), 3);
}

#[test]
fn draft_rejects_due_date_before_issue() {
    let group = group_with(hourly(10.0), 1.0);
    let err = BillingService::build_invoice_draft(&group, Uuid::new_v4(), "INV-1", date(5), date(4))
        .expect_err("due before issue");
    assert!(matches!(err, CoreError::Validation(_)), "unexpected error: {err:?}");
}

#[test]
fn generate_requires_existing_company() {
    let company = Uuid::new_v4();
    let mut store = MemoryStore::with_company(company);
    let client = Uuid::new_v4();
    store.add_rows(vec![row(client, "Acme", &hourly(100.0), 1, 2.0)]);
    let group = BillingService::list_unbilled_groups(&store).unwrap().remove(0);

    let err = BillingService::generate_invoice_from_group(
        &store,
        &group,
        Uuid::new_v4(),
        "INV-1",
        date(31),
        date(31),
    )
    .expect_err("unknown company");
    assert!(matches!(err, CoreError::NotFound(ref msg) if msg.contains("company")));
    assert!(store.recorded().is_empty());
}

#[test]
fn generate_rejects_unpriced_group() {
    let company = Uuid::new_v4();
    let mut store = MemoryStore::with_company(company);
    let mut unpriced = hourly(0.0);
    unpriced.rate = None;
    store.add_rows(vec![row(Uuid::new_v4(), "Acme", &unpriced, 1, 2.0)]);
    let group = BillingService::list_unbilled_groups(&store).unwrap().remove(0);

    let err = BillingService::generate_invoice_from_group(
        &store, &group, company, "INV-1", date(31), date(31),
    )
    .expect_err("no rate");
    assert!(matches!(err, CoreError::NoRateConfigured(_)), "unexpected error: {err:?}");
}

#[test]
fn invoiced_group_disappears_from_listing() {
    let company = Uuid::new_v4();
    let mut store = MemoryStore::with_company(company);
    store.add_rows(vec![
        row(Uuid::new_v4(), "Acme", &hourly(100.0), 1, 2.0),
        row(Uuid::new_v4(), "Beta", &fixed(900.0, "EUR"), 2, 5.0),
    ]);
    let groups = BillingService::list_unbilled_groups(&store).unwrap();
    assert_eq!(groups.len(), 2);

    BillingService::generate_invoice_from_group(
        &store, &groups[0], company, "INV-1", date(31), date(31),
    )
    .expect("invoice");

    let remaining = BillingService::list_unbilled_groups(&store).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, groups[1].key);
}

#[test]
fn batch_continues_past_failing_group() {
    let company = Uuid::new_v4();
    let mut store = MemoryStore::with_company(company);
    let mut unpriced = hourly(0.0);
    unpriced.rate = None;
    store.add_rows(vec![
        row(Uuid::new_v4(), "Acme", &hourly(100.0), 1, 2.0),
        row(Uuid::new_v4(), "Beta", &unpriced, 2, 3.0),
        row(Uuid::new_v4(), "Gamma", &fixed(700.0, "GBP"), 3, 4.0),
    ]);
    let numbers = CountingNumbers(Mutex::new(0));
    let terms = InvoiceTerms::net(company, date(31), 14);

    let report =
        BillingService::generate_invoices_for_all_unbilled_clients(&store, &numbers, &terms)
            .expect("batch runs");

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.invoice_ids().len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].label, "Beta / Main");
    assert!(matches!(report.failures[0].error, CoreError::NoRateConfigured(_)));
    assert_eq!(store.recorded().len(), 2);
    assert!(store
        .recorded()
        .iter()
        .all(|draft| draft.due_date == NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()));
}

#[test]
fn client_run_reports_unknown_client_and_empty_work() {
    let company = Uuid::new_v4();
    let mut store = MemoryStore::with_company(company);
    let acme = Uuid::new_v4();
    store.add_rows(vec![row(acme, "Acme", &hourly(100.0), 1, 2.0)]);
    let numbers = CountingNumbers(Mutex::new(0));
    let terms = InvoiceTerms::net(company, date(31), 30);

    let err =
        BillingService::generate_invoices_for_client(&store, &numbers, Uuid::new_v4(), &terms)
            .expect_err("unknown client");
    assert!(matches!(err, CoreError::NotFound(_)));

    let created = BillingService::generate_invoices_for_client(&store, &numbers, acme, &terms)
        .expect("first run");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].key.client_id, acme);
    assert_eq!(created[0].amount, 200.0);

    let err = BillingService::generate_invoices_for_client(&store, &numbers, acme, &terms)
        .expect_err("nothing left");
    assert!(matches!(err, CoreError::NoUnbilledWork(ref name) if name == "Acme"));
}
