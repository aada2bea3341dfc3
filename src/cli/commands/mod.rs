pub mod client;
pub mod company;
pub mod config;
pub mod contract;
pub mod invoice;
pub mod system;
pub mod tracking;

use crate::cli::core::CommandError;
use crate::cli::registry::{CommandEntry, CommandRegistry};

const ROOT_COMMAND_ORDER: &[&str] = &[
    "company", "client", "contract", "track", "unbilled", "invoice", "config", "help",
    "version", "exit",
];

pub(crate) fn all_entries() -> Vec<CommandEntry> {
    let mut commands = Vec::new();
    commands.extend(company::definitions());
    commands.extend(client::definitions());
    commands.extend(contract::definitions());
    commands.extend(tracking::definitions());
    commands.extend(invoice::definitions());
    commands.extend(config::definitions());
    commands.extend(system::definitions());
    commands
}

pub(crate) fn register_all(registry: &mut CommandRegistry) {
    let mut entries = all_entries();
    entries.sort_by_key(|entry| {
        ROOT_COMMAND_ORDER
            .iter()
            .position(|name| entry.name.eq_ignore_ascii_case(name))
            .unwrap_or(ROOT_COMMAND_ORDER.len())
    });
    for entry in entries {
        registry.register(entry);
    }
}

/// Splits `<subcommand> [args...]`, or fails with the command's usage.
pub(crate) fn split_subcommand<'a, 'b>(
    args: &'b [&'a str],
    usage: &str,
) -> Result<(String, &'b [&'a str]), CommandError> {
    match args.split_first() {
        Some((subcommand, rest)) => Ok((subcommand.to_ascii_lowercase(), rest)),
        None => Err(CommandError::InvalidArguments(format!("usage: {usage}"))),
    }
}

pub(crate) fn unknown_subcommand(command: &str, other: &str, available: &str) -> CommandError {
    CommandError::InvalidArguments(format!(
        "unknown {command} subcommand `{other}`. Available: {available}"
    ))
}

#[cfg(test)]
mod tests {
    use crate::cli::core::test_context;

    #[test]
    fn registry_follows_root_order() {
        let (context, _dir) = test_context();
        let names: Vec<&str> = context.registry.names().collect();
        assert_eq!(
            names,
            vec![
                "company", "client", "contract", "track", "unbilled", "invoice", "config",
                "help", "version", "exit"
            ]
        );
    }
}
