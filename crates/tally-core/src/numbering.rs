//! Human-readable document numbers such as `INV-202401-ACME-001`.

use chrono::NaiveDate;

use crate::CoreResult;

const CODE_LEN: usize = 4;
const FALLBACK_CODE: &str = "CLNT";

/// Supplies unique invoice numbers for a client and reference date.
pub trait InvoiceNumberGenerator: Send + Sync {
    fn generate_invoice_number(&self, client_name: &str, reference_date: NaiveDate)
        -> CoreResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Contract,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Contract => "CTR",
        }
    }
}

/// Short upper-case code for a client: initials for multi-word names,
/// leading characters for single words.
pub fn client_code(client_name: &str) -> String {
    let words: Vec<&str> = client_name
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let code: String = match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(CODE_LEN).collect(),
        many => many
            .iter()
            .take(CODE_LEN)
            .filter_map(|word| word.chars().next())
            .collect(),
    };
    if code.is_empty() {
        FALLBACK_CODE.to_string()
    } else {
        code.to_ascii_uppercase()
    }
}

/// Prefix shared by every document of `kind` for a client within a month.
pub fn document_prefix(kind: DocumentKind, client_name: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}-{}-",
        kind.prefix(),
        date.format("%Y%m"),
        client_code(client_name)
    )
}

/// Picks the next sequence after the highest existing number under `prefix`.
pub fn next_document_number<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:03}", prefix, highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_code_uses_initials_or_leading_letters() {
        assert_eq!(client_code("Acme"), "ACME");
        assert_eq!(client_code("Beta Corp"), "BC");
        assert_eq!(client_code("acme widgets & sons ltd inc"), "AWSL");
        assert_eq!(client_code("Zo"), "ZO");
        assert_eq!(client_code("  ***  "), "CLNT");
    }

    #[test]
    fn next_number_skips_foreign_prefixes() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let prefix = document_prefix(DocumentKind::Invoice, "Acme", date);
        assert_eq!(prefix, "INV-202401-ACME-");
        let existing = ["INV-202401-ACME-001", "INV-202401-ACME-004", "INV-202402-ACME-009"];
        assert_eq!(
            next_document_number(&prefix, existing),
            "INV-202401-ACME-005"
        );
        assert_eq!(
            next_document_number(&prefix, std::iter::empty()),
            "INV-202401-ACME-001"
        );
    }
}
