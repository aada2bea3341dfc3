use tally_domain::{normalize_currency, Client};

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{CommandError, CommandResult, ParsedArgs, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "client add <name> [--email <address>] [--currency <code>]\nclient list";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "client",
        "Manage the clients you bill",
        USAGE,
        cmd_client,
    )]
}

fn cmd_client(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "client <add|list>")?;
    match subcommand.as_str() {
        "add" => add(context, rest),
        "list" | "ls" => list(context),
        other => Err(unknown_subcommand("client", other, "add, list")),
    }
}

fn add(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let name = parsed.positional.join(" ");
    if name.trim().is_empty() {
        return Err(CommandError::InvalidArguments(
            "usage: client add <name> [--email <address>] [--currency <code>]".into(),
        ));
    }

    let currency = parsed
        .option("currency")
        .unwrap_or(context.config.currency.as_str())
        .to_string();
    let mut client = Client::new(name.trim()).with_currency(&currency);
    client.email = parsed.option("email").map(str::to_string);
    context.store.add_client(&client)?;
    output::success(format!("Client `{}` added.", client.name));
    Ok(())
}

fn list(context: &mut ShellContext) -> CommandResult {
    let clients = context.store.list_clients()?;
    if clients.is_empty() {
        output::info("No clients yet.");
        return Ok(());
    }
    output::section("Clients");
    let rows: Vec<Vec<String>> = clients
        .into_iter()
        .map(|client| {
            vec![
                client.name,
                client.email.unwrap_or_default(),
                normalize_currency(Some(&client.currency)),
            ]
        })
        .collect();
    output::table(&["Name", "Email", "Currency"], &rows);
    Ok(())
}
