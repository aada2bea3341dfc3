//! Contracts and the pricing models that govern how tracked time is billed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Billing method agreed on a contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    #[default]
    Hourly,
    FixedPrice,
    Retainer,
}

impl PricingModel {
    /// Stable lower-case label used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            PricingModel::Hourly => "hourly",
            PricingModel::FixedPrice => "fixed_price",
            PricingModel::Retainer => "retainer",
        }
    }
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PricingModel::Hourly => "Hourly",
            PricingModel::FixedPrice => "Fixed price",
            PricingModel::Retainer => "Retainer",
        };
        f.write_str(label)
    }
}

/// Raised when a stored or typed pricing model label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPricingModel(pub String);

impl fmt::Display for UnknownPricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pricing model `{}`", self.0)
    }
}

impl std::error::Error for UnknownPricingModel {}

impl FromStr for PricingModel {
    type Err = UnknownPricingModel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hourly" => Ok(PricingModel::Hourly),
            "fixed_price" | "fixed" => Ok(PricingModel::FixedPrice),
            "retainer" => Ok(PricingModel::Retainer),
            other => Err(UnknownPricingModel(other.to_string())),
        }
    }
}

/// Agreement with a client that fixes the pricing of tracked work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub number: String,
    pub name: String,
    pub pricing_model: PricingModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_price: Option<f64>,
    pub currency: String,
}

impl Contract {
    pub fn hourly(client_id: Uuid, name: impl Into<String>, rate: f64, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            number: String::new(),
            name: name.into(),
            pricing_model: PricingModel::Hourly,
            hourly_rate: Some(rate),
            fixed_price: None,
            currency: normalize_currency(Some(currency)),
        }
    }

    pub fn fixed_price(
        client_id: Uuid,
        name: impl Into<String>,
        price: f64,
        currency: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            number: String::new(),
            name: name.into(),
            pricing_model: PricingModel::FixedPrice,
            hourly_rate: None,
            fixed_price: Some(price),
            currency: normalize_currency(Some(currency)),
        }
    }

    pub fn retainer(client_id: Uuid, name: impl Into<String>, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            number: String::new(),
            name: name.into(),
            pricing_model: PricingModel::Retainer,
            hourly_rate: None,
            fixed_price: None,
            currency: normalize_currency(Some(currency)),
        }
    }
}

impl Displayable for Contract {
    fn display_label(&self) -> String {
        match (self.pricing_model, self.hourly_rate, self.fixed_price) {
            (PricingModel::Hourly, Some(rate), _) => {
                format!("{} ({}/h)", self.name, format_money(rate, &self.currency))
            }
            (PricingModel::FixedPrice, _, Some(price)) => {
                format!("{} (fixed {})", self.name, format_money(price, &self.currency))
            }
            (model, _, _) => format!("{} ({})", self.name, model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_model_parses_storage_labels() {
        for model in [
            PricingModel::Hourly,
            PricingModel::FixedPrice,
            PricingModel::Retainer,
        ] {
            assert_eq!(model.as_str().parse::<PricingModel>(), Ok(model));
        }
        assert_eq!("fixed-price".parse(), Ok(PricingModel::FixedPrice));
        assert!("weekly".parse::<PricingModel>().is_err());
    }

    #[test]
    fn display_label_shows_pricing() {
        let client = Uuid::new_v4();
        assert_eq!(
            Contract::hourly(client, "Main", 100.0, "usd").display_label(),
            "Main (100.00 USD/h)"
        );
        assert_eq!(
            Contract::fixed_price(client, "Launch", 2000.0, "EUR").display_label(),
            "Launch (fixed 2000.00 EUR)"
        );
        assert_eq!(
            Contract::retainer(client, "Care", "USD").display_label(),
            "Care (Retainer)"
        );
    }

    #[test]
    fn pricing_model_serializes_snake_case() {
        let json = serde_json::to_string(&PricingModel::FixedPrice).unwrap();
        assert_eq!(json, "\"fixed_price\"");
    }
}
