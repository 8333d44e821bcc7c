/// Phone normalization helpers.
///
/// All phone matching in the referral pipeline happens on the last 10
/// digits, so "+1 (317) 555-0123", "13175550123" and "3175550123" all
/// attribute to the same person.

/// Strip non-digits and keep the last 10 digits.
pub fn last_ten_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits
    }
}

/// True when both inputs normalize to the same non-empty 10-digit form.
pub fn same_phone(a: &str, b: &str) -> bool {
    let a = last_ten_digits(a);
    let b = last_ten_digits(b);
    !a.is_empty() && a == b
}

/// A candidate looks like a bare phone number (rather than a referral code)
/// when it carries at least 10 digits.
pub fn looks_like_phone(raw: &str) -> bool {
    raw.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_ten_digits() {
        assert_eq!(last_ten_digits("3175550123"), "3175550123");
        assert_eq!(last_ten_digits("+1 (317) 555-0123"), "3175550123");
        assert_eq!(last_ten_digits("13175550123"), "3175550123");
        assert_eq!(last_ten_digits("555-0123"), "5550123");
        assert_eq!(last_ten_digits(""), "");
    }

    #[test]
    fn test_same_phone() {
        assert!(same_phone("+1-317-555-0123", "3175550123"));
        assert!(!same_phone("3175550123", "3175550124"));
        assert!(!same_phone("", ""));
    }

    #[test]
    fn test_looks_like_phone() {
        assert!(looks_like_phone("(317) 555-0123"));
        assert!(!looks_like_phone("KRISTA4F2"));
        assert!(!looks_like_phone("555-0123"));
    }
}
