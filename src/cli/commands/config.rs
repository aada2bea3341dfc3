use tally_config::Config;

use crate::cli::commands::{split_subcommand, unknown_subcommand};
use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "config show [--json]
config set <key> <value>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "config",
        "Show or change preferences",
        USAGE,
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (subcommand, rest) = split_subcommand(args, "config <show|set>")?;
    match subcommand.as_str() {
        "show" => show(context, rest),
        "set" => set(context, rest),
        other => Err(unknown_subcommand("config", other, "show, set")),
    }
}

fn show(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.first() == Some(&"--json") {
        output::info(serde_json::to_string_pretty(&context.config)?);
        return Ok(());
    }
    output::section("Configuration");
    for key in Config::KEYS {
        let value = context.config.get(key)?;
        let value = if value.is_empty() { "-".to_string() } else { value };
        output::info(format!("  {:<20} {}", key, value));
    }
    output::info(format!(
        "  (stored in {})",
        context.config_manager.config_path().display()
    ));
    Ok(())
}

fn set(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((key, value)) = args.split_first() else {
        return Err(CommandError::InvalidArguments(
            "usage: config set <key> <value>".into(),
        ));
    };
    let value = value.join(" ");
    let key = key.to_ascii_lowercase();

    let mut updated = context.config.clone();
    updated.set(&key, &value)?;
    if key == "default_company" {
        if let Some(name) = &updated.default_company {
            context.resolve_company(Some(name.as_str()))?;
        }
    }

    context.config = updated;
    context.persist_config()?;
    if key == "ui_color_enabled" {
        output::set_color_enabled(context.config.ui_color_enabled);
    }
    output::success(format!("Set {} = {}.", key, context.config.get(&key)?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cli::core::{process_script, test_context, CommandError};

    #[test]
    fn set_persists_to_disk() {
        let (mut context, _dir) = test_context();
        process_script(&mut context, &["config set payment_terms_days 45"]);
        assert_eq!(context.config.payment_terms_days, 45);

        let reloaded = context.config_manager.load().unwrap();
        assert_eq!(reloaded.payment_terms_days, 45);
    }

    #[test]
    fn default_company_must_exist() {
        let (mut context, _dir) = test_context();
        let err = context
            .process_line("config set default_company Nowhere")
            .unwrap_err();
        assert!(matches!(err, CommandError::Core(_)));
        assert_eq!(context.config.default_company, None);
    }
}
