//! Shell context, dispatch and the error types shared by command handlers.

use std::{env, io, path::PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rustyline::error::ReadlineError;
use strsim::levenshtein;
use tracing::debug;
use uuid::Uuid;

use tally_config::{Config, ConfigError, ConfigManager};
use tally_core::{Clock, CoreError};
use tally_domain::{Client, Company, Contract};
use tally_storage_sqlite::SqliteStore;

use super::commands;
use super::output;
use super::registry::{CommandEntry, CommandRegistry};
use super::system_clock::SystemClock;

/// Overrides the application directory (`~/.tally`).
pub const TALLY_HOME_ENV: &str = "TALLY_HOME";
/// When set, commands are read line by line from stdin.
pub const SCRIPT_MODE_ENV: &str = "TALLY_CLI_SCRIPT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

pub struct ShellContext {
    pub registry: CommandRegistry,
    pub store: SqliteStore,
    pub config_manager: ConfigManager,
    pub config: Config,
    pub clock: Box<dyn Clock>,
    pub running: bool,
}

impl ShellContext {
    /// Opens the config and database under `$TALLY_HOME` or `~/.tally`.
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let home = env::var_os(TALLY_HOME_ENV).map(PathBuf::from);
        let app_dir = Config::resolve_app_dir(home);
        let config_manager = ConfigManager::with_base_dir(app_dir.clone())?;
        let config = config_manager.load()?;
        let db_path = config.resolve_database_path(&app_dir);
        debug!(path = %db_path.display(), "opening billing database");
        let store = SqliteStore::open(&db_path)?;
        Ok(Self::with_parts(
            mode,
            store,
            config_manager,
            config,
            Box::new(SystemClock),
        ))
    }

    pub fn with_parts(
        mode: CliMode,
        store: SqliteStore,
        config_manager: ConfigManager,
        config: Config,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut registry = CommandRegistry::new();
        commands::register_all(&mut registry);
        output::set_color_enabled(config.ui_color_enabled && mode != CliMode::Script);

        Self {
            registry,
            store,
            config_manager,
            config,
            clock,
            running: true,
        }
    }

    pub(crate) fn prompt(&self) -> String {
        "tally> ".to_string()
    }

    pub(crate) fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub(crate) fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.registry.get(name)
    }

    pub(crate) fn persist_config(&self) -> CommandResult {
        self.config_manager.save(&self.config)?;
        Ok(())
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        if let Some(handler) = self.registry.handler(command) {
            match handler(self, args) {
                Ok(()) => Ok(LoopControl::Continue),
                Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
                Err(err) => Err(err),
            }
        } else {
            self.suggest_command(raw);
            Err(CommandError::UnknownCommand(raw.to_string()))
        }
    }

    pub(crate) fn process_line(&mut self, line: &str) -> Result<LoopControl, CommandError> {
        let tokens = shell_words::split(line)
            .map_err(|err| CommandError::InvalidArguments(err.to_string()))?;
        let Some((raw, rest)) = tokens.split_first() else {
            return Ok(LoopControl::Continue);
        };

        let command = raw.to_lowercase();
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();

        match self.dispatch(&command, raw, &args) {
            Ok(LoopControl::Exit) => {
                self.running = false;
                Ok(LoopControl::Exit)
            }
            other => other,
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));

        let needle = input.to_lowercase();
        let best = self
            .registry
            .names()
            .map(|key| (levenshtein(key, &needle), key))
            .min_by_key(|(distance, _)| *distance);

        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Suggestion: `{}`?", name));
            }
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested | CommandError::UnknownCommand(_) => {}
            CommandError::InvalidArguments(message) => {
                output::error(&message);
                output::hint("Use `help <command>` for usage details.");
            }
            other => output::error(other),
        }
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    pub(crate) fn resolve_client(&self, name: &str) -> Result<Client, CommandError> {
        self.store
            .find_client_by_name(name)?
            .ok_or_else(|| CoreError::NotFound(format!("client `{name}`")).into())
    }

    pub(crate) fn resolve_contract(
        &self,
        client: &Client,
        name_or_number: &str,
    ) -> Result<Contract, CommandError> {
        self.store
            .find_contract(client.id, name_or_number)?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "contract `{name_or_number}` for client `{}`",
                    client.name
                ))
                .into()
            })
    }

    /// The named company, else the configured default, else the only company.
    pub(crate) fn resolve_company(&self, name: Option<&str>) -> Result<Company, CommandError> {
        let wanted = name
            .map(str::to_string)
            .or_else(|| self.config.default_company.clone());
        if let Some(wanted) = wanted {
            return self
                .store
                .find_company_by_name(&wanted)?
                .ok_or_else(|| CoreError::NotFound(format!("company `{wanted}`")).into());
        }

        let mut companies = self.store.list_companies()?;
        match companies.len() {
            1 => Ok(companies.remove(0)),
            0 => Err(CommandError::Message(
                "no issuing company yet. Add one with `company add <name>`.".into(),
            )),
            _ => Err(CommandError::InvalidArguments(
                "several companies exist. Name one or run `config set default_company <name>`."
                    .into(),
            )),
        }
    }

    pub(crate) fn client_names(&self) -> Result<Vec<(Uuid, String)>, CommandError> {
        Ok(self
            .store
            .list_clients()?
            .into_iter()
            .map(|client| (client.id, client.name))
            .collect())
    }
}

// =============================================================================
// Argument helpers
// =============================================================================

/// Positional arguments plus `--flag value` options and bare `--switch`es.
#[derive(Debug, Default)]
pub(crate) struct ParsedArgs<'a> {
    pub positional: Vec<&'a str>,
    options: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> ParsedArgs<'a> {
    /// `switches` name the flags that take no value.
    pub fn parse(args: &[&'a str], switches: &[&str]) -> Result<Self, CommandError> {
        let mut parsed = ParsedArgs::default();
        let mut iter = args.iter().copied();
        while let Some(arg) = iter.next() {
            let Some(flag) = arg.strip_prefix("--") else {
                parsed.positional.push(arg);
                continue;
            };
            if switches.contains(&flag) {
                parsed.options.push((flag, None));
                continue;
            }
            let value = iter.next().ok_or_else(|| {
                CommandError::InvalidArguments(format!("option `--{flag}` needs a value"))
            })?;
            parsed.options.push((flag, Some(value)));
        }
        Ok(parsed)
    }

    pub fn option(&self, flag: &str) -> Option<&'a str> {
        self.options
            .iter()
            .rev()
            .find(|(name, _)| *name == flag)
            .and_then(|(_, value)| *value)
    }

    pub fn switch(&self, flag: &str) -> bool {
        self.options.iter().any(|(name, _)| *name == flag)
    }
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        CommandError::InvalidArguments(format!("invalid date `{}` (use YYYY-MM-DD)", input))
    })
}

/// Accepts `HH:MM` (on `date`) for session starts.
pub(crate) fn parse_time_on(date: NaiveDate, input: &str) -> Result<DateTime<Utc>, CommandError> {
    let time = NaiveTime::parse_from_str(input, "%H:%M").map_err(|_| {
        CommandError::InvalidArguments(format!("invalid time `{}` (use HH:MM)", input))
    })?;
    Ok(NaiveDateTime::new(date, time).and_utc())
}

pub(crate) fn parse_amount(label: &str, input: &str) -> Result<f64, CommandError> {
    let value: f64 = input.trim().parse().map_err(|_| {
        CommandError::InvalidArguments(format!("invalid {label} `{}`", input))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(CommandError::InvalidArguments(format!(
            "{label} must be a non-negative number"
        )));
    }
    Ok(value)
}

pub(crate) fn short_id(id: Uuid) -> String {
    let mut short = id.simple().to_string();
    short.truncate(8);
    short
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Message(String),
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("exit requested")]
    ExitRequested,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Command(String),
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Core(inner) => CliError::Core(inner),
            CommandError::Config(inner) => CliError::Config(inner),
            CommandError::Io(inner) => CliError::Io(inner),
            other => CliError::Command(other.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> (ShellContext, tempfile::TempDir) {
    use chrono::TimeZone;
    use tally_core::time::FixedClock;

    let dir = tempfile::tempdir().expect("tempdir");
    let config_manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("config");
    let store = SqliteStore::open_in_memory().expect("store");
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 30, 17, 0, 0).unwrap());
    let context = ShellContext::with_parts(
        CliMode::Script,
        store,
        config_manager,
        Config::default(),
        Box::new(clock),
    );
    (context, dir)
}

#[cfg(test)]
pub(crate) fn process_script(context: &mut ShellContext, lines: &[&str]) {
    for line in lines {
        match context.process_line(line) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => panic!("`{line}` failed: {err}"),
        }
    }
}
