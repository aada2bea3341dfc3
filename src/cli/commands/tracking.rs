//! Time tracking: manual entries, running sessions and soft deletion.

use chrono::Duration;
use uuid::Uuid;

use tally_core::CoreError;
use tally_domain::{Client, Contract, Displayable, TimeEntry};

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{
    parse_amount, parse_date, parse_time_on, short_id, CommandError, CommandResult, ParsedArgs,
    ShellContext,
};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const DEFAULT_LABEL: &str = "General";
const DEFAULT_START: &str = "09:00";
/// Longest single entry `track add` accepts: one leap year of hours.
const MAX_ENTRY_HOURS: f64 = 24.0 * 366.0;

const USAGE: &str = "track add <client> <YYYY-MM-DD> <hours> [--contract <name>] [--label <text>] [--start <HH:MM>] [--notes <text>] [--non-billable]
track start <client> [--contract <name>] [--label <text>]
track stop
track list [client]
track delete <entry id>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "track",
        "Record, start, stop, list and delete time entries",
        USAGE,
        cmd_track,
    )]
}

fn cmd_track(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "track <add|start|stop|list|delete>")?;
    match subcommand.as_str() {
        "add" => add(context, rest),
        "start" => start(context, rest),
        "stop" => stop(context),
        "list" | "ls" => list(context, rest),
        "delete" | "rm" => delete(context, rest),
        other => Err(unknown_subcommand(
            "track",
            other,
            "add, start, stop, list, delete",
        )),
    }
}

fn add(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &["non-billable"])?;
    let [client_name, date, hours] = parsed.positional.as_slice() else {
        return Err(CommandError::InvalidArguments(
            "usage: track add <client> <YYYY-MM-DD> <hours> [options]".into(),
        ));
    };

    let client = context.resolve_client(client_name)?;
    let contract = contract_option(context, &client, &parsed)?;
    let date = parse_date(date)?;
    let start = parse_time_on(date, parsed.option("start").unwrap_or(DEFAULT_START))?;
    let hours = parse_amount("hours", hours)?;
    if hours > MAX_ENTRY_HOURS {
        return Err(CommandError::InvalidArguments(format!(
            "hours must be at most {MAX_ENTRY_HOURS}"
        )));
    }
    let end = start
        .checked_add_signed(Duration::seconds((hours * 3600.0).round() as i64))
        .ok_or_else(|| CommandError::InvalidArguments("entry ends out of range".into()))?;

    let mut entry = TimeEntry::completed(
        Some(client.id),
        contract.as_ref().map(|c| c.id),
        label(&parsed, contract.as_ref()),
        start,
        end,
    );
    if let Some(notes) = parsed.option("notes") {
        entry = entry.with_notes(notes);
    }
    if parsed.switch("non-billable") {
        entry = entry.non_billable();
    }

    context.store.add_time_entry(&entry)?;
    output::success(format!(
        "Logged {} for {} [{}].",
        entry.display_label(),
        client.name,
        short_id(entry.id)
    ));
    Ok(())
}

fn start(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args, &[])?;
    let [client_name] = parsed.positional.as_slice() else {
        return Err(CommandError::InvalidArguments(
            "usage: track start <client> [--contract <name>] [--label <text>]".into(),
        ));
    };

    let client = context.resolve_client(client_name)?;
    let contract = contract_option(context, &client, &parsed)?;
    let entry = context.store.start_tracking(
        Some(client.id),
        contract.as_ref().map(|c| c.id),
        &label(&parsed, contract.as_ref()),
        context.clock.now(),
    )?;
    output::success(format!(
        "Tracking `{}` for {} since {}.",
        entry.project_label,
        client.name,
        entry.start_time.format("%H:%M")
    ));
    Ok(())
}

fn stop(context: &mut ShellContext) -> CommandResult {
    let entry = context.store.stop_tracking(context.clock.now())?;
    output::success(format!("Stopped: {}.", entry.display_label()));
    Ok(())
}

fn list(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let client = if args.is_empty() {
        None
    } else {
        Some(context.resolve_client(&args.join(" "))?)
    };
    let entries = context.store.list_time_entries(client.as_ref().map(|c| c.id))?;
    if entries.is_empty() {
        output::info("No time entries.");
        return Ok(());
    }

    let clients = context.client_names()?;
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            let client_name = entry
                .client_id
                .and_then(|id| clients.iter().find(|(client_id, _)| *client_id == id))
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| "-".into());
            let status = if entry.is_running() {
                "running"
            } else if entry.is_invoiced() {
                "invoiced"
            } else if !entry.billable {
                "non-billable"
            } else {
                "unbilled"
            };
            vec![
                short_id(entry.id),
                entry.start_time.format("%Y-%m-%d %H:%M").to_string(),
                client_name,
                entry.project_label.clone(),
                entry
                    .hours
                    .map(|hours| format!("{hours:.2}"))
                    .unwrap_or_else(|| "-".into()),
                status.to_string(),
            ]
        })
        .collect();
    output::section("Time entries");
    output::table(&["Id", "Start", "Client", "Label", "Hours", "Status"], &rows);
    Ok(())
}

fn delete(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [reference] = args else {
        return Err(CommandError::InvalidArguments(
            "usage: track delete <entry id>".into(),
        ));
    };
    let id = resolve_entry_id(context, reference)?;
    context.store.soft_delete_time_entry(id)?;
    output::success(format!("Deleted time entry {}.", short_id(id)));
    Ok(())
}

/// Accepts a full id or the short prefix shown by `track list`.
fn resolve_entry_id(context: &ShellContext, reference: &str) -> Result<Uuid, CommandError> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }
    let needle = reference.to_ascii_lowercase();
    let matches: Vec<Uuid> = context
        .store
        .list_time_entries(None)?
        .into_iter()
        .map(|entry| entry.id)
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(CoreError::NotFound(format!("time entry `{reference}`")).into()),
        _ => Err(CommandError::InvalidArguments(format!(
            "`{reference}` matches several entries; use more characters"
        ))),
    }
}

fn contract_option(
    context: &ShellContext,
    client: &Client,
    parsed: &ParsedArgs<'_>,
) -> Result<Option<Contract>, CommandError> {
    parsed
        .option("contract")
        .map(|name| context.resolve_contract(client, name))
        .transpose()
}

fn label(parsed: &ParsedArgs<'_>, contract: Option<&Contract>) -> String {
    parsed
        .option("label")
        .map(str::to_string)
        .or_else(|| contract.map(|c| c.name.clone()))
        .unwrap_or_else(|| DEFAULT_LABEL.to_string())
}
