use tally_domain::Company;

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "company add <name>\ncompany list";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "company",
        "Manage the companies that issue invoices",
        USAGE,
        cmd_company,
    )]
}

fn cmd_company(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "company <add|list>")?;
    match subcommand.as_str() {
        "add" => add(context, rest),
        "list" | "ls" => list(context),
        other => Err(unknown_subcommand("company", other, "add, list")),
    }
}

fn add(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let name = args.join(" ");
    if name.trim().is_empty() {
        return Err(CommandError::InvalidArguments("usage: company add <name>".into()));
    }
    let company = Company::new(name.trim());
    context.store.add_company(&company)?;
    output::success(format!("Company `{}` added.", company.name));
    Ok(())
}

fn list(context: &mut ShellContext) -> CommandResult {
    let companies = context.store.list_companies()?;
    if companies.is_empty() {
        output::info("No companies yet.");
        return Ok(());
    }
    output::section("Companies");
    let default = context.config.default_company.as_deref();
    for company in companies {
        let marker = match default {
            Some(name) if name.eq_ignore_ascii_case(&company.name) => " (default)",
            _ => "",
        };
        output::info(format!("  {}{}", company.name, marker));
    }
    Ok(())
}
