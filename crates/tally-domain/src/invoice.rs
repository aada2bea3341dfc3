//! Invoices and their line items.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
/// Enumerates the payment lifecycle of an invoice.
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status `{other}`")),
        }
    }
}

/// Invoice header as stored, linked to its issuing company and client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub status: InvoiceStatus,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl Displayable for Invoice {
    fn display_label(&self) -> String {
        format!(
            "{} {} [{}]",
            self.number,
            format_money(self.amount, &self.currency),
            self.status
        )
    }
}

/// One billed position on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_combines_number_amount_and_status() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            number: "INV-202406-ACME-001".into(),
            company_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            amount: 500.0,
            currency: "USD".into(),
            description: "Acme / Main".into(),
            status: InvoiceStatus::Pending,
            issued_date: date,
            due_date: date,
        };
        assert_eq!(
            invoice.display_label(),
            "INV-202406-ACME-001 500.00 USD [Pending]"
        );
        assert_eq!("PAID".parse(), Ok(InvoiceStatus::Paid));
    }
}
