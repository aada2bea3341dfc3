use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigError;

const DATABASE_FILE: &str = "tally.db";

/// Stores user-configurable CLI preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    #[serde(default = "Config::default_payment_terms_days")]
    pub payment_terms_days: u32,
    /// Company that issues invoices when a command names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional database location. Defaults to `<app dir>/tally.db`.
    pub database_path: Option<PathBuf>,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: "USD".into(),
            payment_terms_days: Self::default_payment_terms_days(),
            default_company: None,
            database_path: None,
            ui_color_enabled: Self::default_ui_color_enabled(),
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 6] = [
        "locale",
        "currency",
        "payment_terms_days",
        "default_company",
        "database_path",
        "ui_color_enabled",
    ];

    pub fn default_payment_terms_days() -> u32 {
        30
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn resolve_database_path(&self, app_dir: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => app_dir.join(path),
            None => app_dir.join(DATABASE_FILE),
        }
    }

    /// Home for config and data: `$TALLY_HOME` when given, else `~/.tally`.
    pub fn resolve_app_dir(tally_home: Option<PathBuf>) -> PathBuf {
        if let Some(path) = tally_home.filter(|path| !path.as_os_str().is_empty()) {
            return path;
        }

        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join(".tally")
    }

    /// Current value of `key` rendered for display.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "locale" => self.locale.clone(),
            "currency" => self.currency.clone(),
            "payment_terms_days" => self.payment_terms_days.to_string(),
            "default_company" => self.default_company.clone().unwrap_or_default(),
            "database_path" => self
                .database_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            "ui_color_enabled" => self.ui_color_enabled.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Updates `key` from user input. An empty value clears optional settings.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "locale" => self.locale = required(key, value)?,
            "currency" => {
                let code = required(key, value)?;
                if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
                    return Err(invalid(key, "expected a three-letter currency code"));
                }
                self.currency = code.to_ascii_uppercase();
            }
            "payment_terms_days" => {
                self.payment_terms_days = value
                    .parse()
                    .map_err(|_| invalid(key, "expected a whole number of days"))?;
            }
            "default_company" => self.default_company = optional(value),
            "database_path" => self.database_path = optional(value).map(PathBuf::from),
            "ui_color_enabled" => {
                self.ui_color_enabled = match value.to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" => true,
                    "false" | "off" | "no" => false,
                    _ => return Err(invalid(key, "expected on or off")),
                };
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn required(key: &str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        Err(invalid(key, "value must not be empty"))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn unknown_key(key: &str) -> ConfigError {
    invalid(
        key,
        &format!("unknown setting (expected one of: {})", Config::KEYS.join(", ")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_database_path_lives_under_app_dir() {
        let mut config = Config::default();
        let app = Path::new("/srv/tally");
        assert_eq!(config.resolve_database_path(app), app.join("tally.db"));

        config.database_path = Some(PathBuf::from("books/2024.db"));
        assert_eq!(
            config.resolve_database_path(app),
            app.join("books/2024.db")
        );
    }

    #[test]
    fn tally_home_overrides_home_dir() {
        let dir = Config::resolve_app_dir(Some(PathBuf::from("/tmp/tally-home")));
        assert_eq!(dir, PathBuf::from("/tmp/tally-home"));
        assert!(Config::resolve_app_dir(None).ends_with(".tally"));
    }

    #[test]
    fn set_validates_values() {
        let mut config = Config::default();
        config.set("currency", "eur").unwrap();
        assert_eq!(config.currency, "EUR");
        config.set("payment_terms_days", "14").unwrap();
        assert_eq!(config.get("payment_terms_days").unwrap(), "14");
        config.set("default_company", "Studio").unwrap();
        config.set("default_company", "").unwrap();
        assert_eq!(config.default_company, None);

        assert!(config.set("payment_terms_days", "soon").is_err());
        assert!(config.set("currency", "euro").is_err());
        assert!(config.set("colour", "on").is_err());
    }
}
