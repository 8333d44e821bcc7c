/// Currency utility functions for handling reward amounts.
///
/// All monetary values in the database are stored in cents (1 dollar = 100
/// cents) to avoid floating-point precision issues.

/// Convert dollars to cents (multiply by 100)
pub fn dollars_to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

/// Convert cents to dollars (divide by 100)
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Format cents as a dollar string with 2 decimal places
pub fn format_cents_as_dollars(cents: i64) -> String {
    format!("${:.2}", cents_to_dollars(cents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars_to_cents() {
        assert_eq!(dollars_to_cents(25.0), 2500);
        assert_eq!(dollars_to_cents(0.50), 50);
        assert_eq!(dollars_to_cents(123.45), 12345);
    }

    #[test]
    fn test_cents_to_dollars() {
        assert_eq!(cents_to_dollars(2500), 25.0);
        assert_eq!(cents_to_dollars(50), 0.50);
    }

    #[test]
    fn test_format_cents_as_dollars() {
        assert_eq!(format_cents_as_dollars(2500), "$25.00");
        assert_eq!(format_cents_as_dollars(50), "$0.50");
    }
}
