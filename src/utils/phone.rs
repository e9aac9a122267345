use std::sync::LazyLock;

use regex::Regex;

/// Ten-digit Indian mobile number.
pub static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6789]\d{9}$").expect("phone pattern is valid"));

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Reduces common spellings (+91, 91, 0091-style prefixes, spaces, dashes) to the stored 10-digit form.
/// Input that matches none of them is returned with only non-digits removed.
pub fn normalize_phone(phone: &str) -> String {
    let cleaned = digits(phone);

    if cleaned.len() == 10 && PHONE_RE.is_match(&cleaned) {
        return cleaned;
    }
    if cleaned.len() == 12 && cleaned.starts_with("91") && PHONE_RE.is_match(&cleaned[2..]) {
        return cleaned[2..].to_string();
    }
    if cleaned.len() == 13 && cleaned.starts_with("91") && PHONE_RE.is_match(&cleaned[3..]) {
        return cleaned[3..].to_string();
    }

    cleaned
}

pub fn format_phone_display(phone: &str) -> String {
    let normalized = normalize_phone(phone);
    if PHONE_RE.is_match(&normalized) {
        format!("+91{}", normalized)
    } else {
        phone.to_string()
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(&digits(phone))
}

/// Heuristic used by login: identifiers without an `@` are treated as phone numbers.
pub fn looks_like_phone(identifier: &str) -> bool {
    !identifier.contains('@') && identifier.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefixed_forms() {
        assert_eq!(normalize_phone("9876543210"), "9876543210");
        assert_eq!(normalize_phone("+91 98765 43210"), "9876543210");
        assert_eq!(normalize_phone("919876543210"), "9876543210");
        assert_eq!(normalize_phone("9109876543210"), "9876543210");
    }

    #[test]
    fn leaves_unknown_forms_as_digits() {
        assert_eq!(normalize_phone("12-345"), "12345");
        assert_eq!(normalize_phone("5876543210"), "5876543210");
    }

    #[test]
    fn display_form() {
        assert_eq!(format_phone_display("9876543210"), "+919876543210");
        assert_eq!(format_phone_display("12345"), "12345");
    }

    #[test]
    fn validation_and_identifier_detection() {
        assert!(is_valid_phone("98765-43210"));
        assert!(!is_valid_phone("1234567890"));
        assert!(looks_like_phone("+91 9876543210"));
        assert!(!looks_like_phone("client@test.com"));
    }
}
