//! Unbilled review and invoice generation.

use tally_core::{BillingGroup, BillingService, CoreError, InvoiceTerms};
use tally_domain::{format_money, Displayable, PricingModel};

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "invoice create <client> [company]
invoice all [company]
invoice list
invoice show <number>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "unbilled",
            "Show unbilled time grouped by client and contract",
            "unbilled [client]",
            cmd_unbilled,
        ),
        CommandEntry::new(
            "invoice",
            "Invoice unbilled time and review invoices",
            USAGE,
            cmd_invoice,
        ),
    ]
}

fn cmd_unbilled(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let groups = if args.is_empty() {
        BillingService::list_unbilled_groups(&context.store)?
    } else {
        let client = context.resolve_client(&args.join(" "))?;
        BillingService::list_unbilled_groups_for_client(&context.store, client.id)?
    };

    if groups.is_empty() {
        output::info("Nothing to invoice.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = groups.iter().map(group_row).collect();
    output::section("Unbilled time");
    output::table(&["Client", "Contract", "Pricing", "Entries", "Hours", "Amount"], &rows);
    Ok(())
}

fn group_row(group: &BillingGroup) -> Vec<String> {
    let (amount, currency) = BillingService::compute_amount(group);
    let contract = if group.contract_name.is_empty() {
        "(none)".to_string()
    } else {
        group.contract_name.clone()
    };
    let pricing = match group.contract_id() {
        Some(_) => group.pricing_model.to_string(),
        None => "-".to_string(),
    };
    let amount = if amount > 0.0 {
        format_money(amount, &currency)
    } else if group.pricing_model == PricingModel::Retainer {
        "not billable".to_string()
    } else {
        "no rate".to_string()
    };
    vec![
        group.client_name.clone(),
        contract,
        pricing,
        group.entries.len().to_string(),
        format!("{:.2}", group.total_hours),
        amount,
    ]
}

fn cmd_invoice(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "invoice <create|all|list|show>")?;
    match subcommand.as_str() {
        "create" => create(context, rest),
        "all" => create_all(context, rest),
        "list" | "ls" => list(context),
        "show" => show(context, rest),
        other => Err(unknown_subcommand(
            "invoice",
            other,
            "create, all, list, show",
        )),
    }
}

fn invoice_terms(
    context: &ShellContext,
    company: Option<&str>,
) -> Result<InvoiceTerms, CommandError> {
    let company = context.resolve_company(company)?;
    Ok(InvoiceTerms::net(
        company.id,
        context.clock.today(),
        context.config.payment_terms_days,
    ))
}

fn create(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (client_name, company) = match args {
        [client] => (*client, None),
        [client, company] => (*client, Some(*company)),
        _ => {
            return Err(CommandError::InvalidArguments(
                "usage: invoice create <client> [company]".into(),
            ))
        }
    };
    let client = context.resolve_client(client_name)?;
    let terms = invoice_terms(context, company)?;

    let store = &context.store;
    let created = BillingService::generate_invoices_for_client(store, store, client.id, &terms)?;
    for invoice in &created {
        output::success(format!(
            "Invoice {} created for {}: {}.",
            invoice.number,
            invoice.client_name,
            format_money(invoice.amount, &invoice.currency)
        ));
    }
    output::info(format!("Due {}.", terms.due_date));
    Ok(())
}

fn create_all(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.len() > 1 {
        return Err(CommandError::InvalidArguments(
            "usage: invoice all [company]".into(),
        ));
    }
    let terms = invoice_terms(context, args.first().copied())?;
    let store = &context.store;
    let report = BillingService::generate_invoices_for_all_unbilled_clients(store, store, &terms)?;

    if report.created.is_empty() && report.failures.is_empty() {
        output::info("Nothing to invoice.");
        return Ok(());
    }
    for invoice in &report.created {
        output::success(format!(
            "Invoice {} created for {}: {}.",
            invoice.number,
            invoice.client_name,
            format_money(invoice.amount, &invoice.currency)
        ));
    }
    for failure in &report.failures {
        output::warning(format!("Skipped {}: {}", failure.label, failure.error));
    }
    output::info(format!(
        "{} invoice(s) created, {} group(s) skipped.",
        report.created.len(),
        report.failures.len()
    ));
    Ok(())
}

fn list(context: &mut ShellContext) -> CommandResult {
    let invoices = context.store.list_invoices()?;
    if invoices.is_empty() {
        output::info("No invoices yet.");
        return Ok(());
    }
    let clients = context.client_names()?;
    let rows: Vec<Vec<String>> = invoices
        .into_iter()
        .map(|invoice| {
            let client = clients
                .iter()
                .find(|(id, _)| *id == invoice.client_id)
                .map(|(_, name)| name.clone())
                .unwrap_or_default();
            vec![
                invoice.number,
                client,
                invoice.issued_date.to_string(),
                invoice.due_date.to_string(),
                format_money(invoice.amount, &invoice.currency),
                invoice.status.to_string(),
            ]
        })
        .collect();
    output::section("Invoices");
    output::table(&["Number", "Client", "Issued", "Due", "Amount", "Status"], &rows);
    Ok(())
}

fn show(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [number] = args else {
        return Err(CommandError::InvalidArguments(
            "usage: invoice show <number>".into(),
        ));
    };
    let invoice = context
        .store
        .invoice_by_number(number)?
        .ok_or_else(|| CoreError::NotFound(format!("invoice `{number}`")))?;
    let items = context.store.invoice_line_items(invoice.id)?;

    output::section(format!("Invoice {}", invoice.display_label()));
    output::info(format!("  {}", invoice.description));
    output::info(format!(
        "  Issued {} / due {}",
        invoice.issued_date, invoice.due_date
    ));
    let rows: Vec<Vec<String>> = items
        .into_iter()
        .map(|item| {
            vec![
                item.label,
                item.description.unwrap_or_default(),
                format!("{:.2}", item.quantity),
                format_money(item.rate, &invoice.currency),
                format_money(item.amount, &invoice.currency),
            ]
        })
        .collect();
    output::table(&["Item", "Description", "Qty", "Rate", "Amount"], &rows);
    output::info(format!(
        "  Total: {}",
        format_money(invoice.amount, &invoice.currency)
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cli::core::{process_script, test_context, CommandError};
    use tally_core::{BillingService, CoreError};

    #[test]
    fn create_invoices_client_with_configured_terms() {
        let (mut context, _dir) = test_context();
        context.config.payment_terms_days = 14;
        process_script(
            &mut context,
            &[
                "company add Studio",
                "client add Acme",
                "contract add Acme Main hourly 100",
                "track add Acme 2024-06-03 3 --contract Main",
                "track add Acme 2024-06-04 2 --contract Main",
                "invoice create Acme",
            ],
        );

        let invoices = context.store.list_invoices().unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].number, "INV-202406-ACME-001");
        assert_eq!(invoices[0].amount, 500.0);
        assert_eq!(invoices[0].issued_date.to_string(), "2024-06-30");
        assert_eq!(invoices[0].due_date.to_string(), "2024-07-14");
        assert!(BillingService::list_unbilled_groups(&context.store)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn second_run_reports_no_unbilled_work() {
        let (mut context, _dir) = test_context();
        process_script(
            &mut context,
            &[
                "company add Studio",
                "client add Acme",
                "contract add Acme Build fixed 2000 --currency EUR",
                "track add Acme 2024-06-03 10 --contract Build",
                "invoice create Acme Studio",
            ],
        );

        let err = context.process_line("invoice create Acme Studio").unwrap_err();
        assert!(matches!(err, CommandError::Core(CoreError::NoUnbilledWork(_))));
    }

    #[test]
    fn batch_run_keeps_going_past_unpriced_groups() {
        let (mut context, _dir) = test_context();
        process_script(
            &mut context,
            &[
                "company add Studio",
                "client add Acme",
                "client add Gamma",
                "contract add Acme Main hourly 80",
                "track add Acme 2024-06-03 2 --contract Main",
                "track add Gamma 2024-06-03 4",
                "invoice all",
                "invoice list",
                "invoice show INV-202406-ACME-001",
            ],
        );

        assert_eq!(context.store.list_invoices().unwrap().len(), 1);
        let left = BillingService::list_unbilled_groups(&context.store).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].client_name, "Gamma");
    }
}
