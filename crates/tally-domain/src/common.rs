//! Display trait and currency helpers for billing primitives.

/// Currency assumed whenever neither contract nor client specifies one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Upper-cases and trims a currency code, falling back to [`DEFAULT_CURRENCY`].
pub fn normalize_currency(code: Option<&str>) -> String {
    match code.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_ascii_uppercase(),
        _ => DEFAULT_CURRENCY.to_string(),
    }
}

/// Number of decimal places conventionally shown for `code`.
pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" => 0,
        "KWD" | "BHD" => 3,
        _ => 2,
    }
}

/// Renders `amount` with the precision of `code`, e.g. `500.00 USD`.
pub fn format_money(amount: f64, code: &str) -> String {
    let precision = minor_units_for(code) as usize;
    format!("{:.*} {}", precision, amount, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_currency_defaults_blank_values() {
        assert_eq!(normalize_currency(None), "USD");
        assert_eq!(normalize_currency(Some("  ")), "USD");
        assert_eq!(normalize_currency(Some("eur")), "EUR");
    }

    #[test]
    fn format_money_respects_minor_units() {
        assert_eq!(format_money(500.0, "USD"), "500.00 USD");
        assert_eq!(format_money(1200.0, "JPY"), "1200 JPY");
    }
}
