use tally_domain::{format_money, Contract, Displayable, PricingModel};

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{parse_amount, CommandError, CommandResult, ParsedArgs, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const ADD_USAGE: &str =
    "contract add <client> <name> <hourly <rate>|fixed <price>|retainer> [--currency <code>]";
const USAGE: &str = "contract add <client> <name> <hourly <rate>|fixed <price>|retainer> [--currency <code>]
contract list [client]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "contract",
        "Manage client contracts and their pricing",
        USAGE,
        cmd_contract,
    )]
}

fn cmd_contract(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "contract <add|list>")?;
    match subcommand.as_str() {
        "add" => add(context, rest),
        "list" | "ls" => list(context, rest),
        other => Err(unknown_subcommand("contract", other, "add, list")),
    }
}

fn add(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let usage = || CommandError::InvalidArguments(format!("usage: {ADD_USAGE}"));
    let [client_name, name, model, rest @ ..] = parsed.positional.as_slice() else {
        return Err(usage());
    };

    let client = context.resolve_client(client_name)?;
    let currency = parsed
        .option("currency")
        .unwrap_or(context.config.currency.as_str())
        .to_string();
    let pricing: PricingModel = model
        .parse()
        .map_err(|err| CommandError::InvalidArguments(format!("{err}")))?;

    let contract = match (pricing, rest) {
        (PricingModel::Hourly, [rate]) => {
            Contract::hourly(client.id, *name, parse_amount("rate", rate)?, &currency)
        }
        (PricingModel::FixedPrice, [price]) => {
            Contract::fixed_price(client.id, *name, parse_amount("price", price)?, &currency)
        }
        (PricingModel::Retainer, []) => Contract::retainer(client.id, *name, &currency),
        _ => return Err(usage()),
    };

    let stored = context.store.add_contract(&contract, context.clock.today())?;
    output::success(format!(
        "Contract {} {} added for {}.",
        stored.number,
        stored.display_label(),
        client.name
    ));
    Ok(())
}

fn list(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let client = if args.is_empty() {
        None
    } else {
        Some(context.resolve_client(&args.join(" "))?)
    };

    let contracts = context.store.list_contracts(client.as_ref().map(|c| c.id))?;
    if contracts.is_empty() {
        output::info("No contracts yet.");
        return Ok(());
    }

    let clients = context.client_names()?;
    let rows: Vec<Vec<String>> = contracts
        .into_iter()
        .map(|contract| {
            let client_name = clients
                .iter()
                .find(|(id, _)| *id == contract.client_id)
                .map(|(_, name)| name.clone())
                .unwrap_or_default();
            vec![
                contract.number.clone(),
                client_name,
                contract.name.clone(),
                contract.pricing_model.to_string(),
                describe_price(&contract),
            ]
        })
        .collect();
    output::section("Contracts");
    output::table(&["Number", "Client", "Name", "Pricing", "Price"], &rows);
    Ok(())
}

fn describe_price(contract: &Contract) -> String {
    match contract.pricing_model {
        PricingModel::Hourly => contract
            .hourly_rate
            .map(|rate| format!("{}/h", format_money(rate, &contract.currency)))
            .unwrap_or_else(|| "no rate".into()),
        PricingModel::FixedPrice => contract
            .fixed_price
            .map(|price| format_money(price, &contract.currency))
            .unwrap_or_else(|| "no price".into()),
        PricingModel::Retainer => "-".into(),
    }
}
