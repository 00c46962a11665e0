/// Render an amount in minor units as a decimal string with two fractional digits.
pub fn format_minor_units(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(1100, "USD"), "11.00 USD");
        assert_eq!(format_minor_units(-5, "EUR"), "-0.05 EUR");
        assert_eq!(format_minor_units(0, "USD"), "0.00 USD");
    }
}
