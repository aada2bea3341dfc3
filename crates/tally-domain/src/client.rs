//! Billing parties: the clients invoiced and the companies issuing invoices.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A customer that receives invoices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub currency: String,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = normalize_currency(Some(currency));
        self
    }
}

/// The business entity that issues invoices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
