//! Masking helpers shared by every domain that writes audit
//! metadata. These run *before* an entry is built; nothing in this
//! crate unmasks.

/// Fallback when a coordinate has no human-readable label. Fixed
/// string: even reduced-precision coordinates are too sensitive for
/// audit text.
pub const GENERIC_LOCATION: &str = "approximate location";

/// Replace a coordinate with its label ("near <label>") or the
/// generic fallback. The numeric values are accepted only so call
/// sites hand over everything they have; they are never rendered.
pub fn mask_coordinate(_lat: f64, _lon: f64, label: Option<&str>) -> String {
    match label {
        Some(l) if !l.trim().is_empty() => format!("near {}", l.trim()),
        _ => GENERIC_LOCATION.to_string(),
    }
}

/// Keep only the last 4 digits of a phone number.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "…".repeat(digits.len().min(1)) + &digits.iter().collect::<String>();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("…{last4}")
}

/// Keep a short prefix of an opaque identifier (account id, device
/// id) so entries stay correlatable without being reversible.
pub fn mask_identifier(id: &str) -> String {
    let prefix: String = id.chars().take(4).collect();
    if id.chars().count() <= 4 {
        prefix
    } else {
        format!("{prefix}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_coordinate_uses_the_label() {
        let s = mask_coordinate(52.5200, 13.4050, Some("Alexanderplatz"));
        assert_eq!(s, "near Alexanderplatz");
        assert_no_decimal_coordinate(&s);
    }

    #[test]
    fn unlabeled_coordinate_uses_the_fixed_fallback() {
        let s = mask_coordinate(52.5200, 13.4050, None);
        assert_eq!(s, GENERIC_LOCATION);
        assert_no_decimal_coordinate(&s);

        // Whitespace-only labels count as absent.
        assert_eq!(mask_coordinate(1.0, 2.0, Some("  ")), GENERIC_LOCATION);
    }

    #[test]
    fn phone_keeps_last_four_digits_only() {
        assert_eq!(mask_phone("+1 (415) 555-2671"), "…2671");
        assert_eq!(mask_phone("030 901820"), "…1820");
        // Short numbers never reveal more than they have.
        assert_eq!(mask_phone("911"), "…911");
    }

    #[test]
    fn identifier_keeps_a_prefix() {
        assert_eq!(mask_identifier("acct_9f83k2"), "acct…");
        assert_eq!(mask_identifier("ab"), "ab");
    }

    /// Asserts the string contains no decimal-coordinate-looking
    /// token (digits, dot, digits).
    fn assert_no_decimal_coordinate(s: &str) {
        let bytes = s.as_bytes();
        for i in 0..bytes.len() {
            if bytes[i] == b'.'
                && i > 0
                && i + 1 < bytes.len()
                && bytes[i - 1].is_ascii_digit()
                && bytes[i + 1].is_ascii_digit()
            {
                panic!("masked string leaks a decimal coordinate: {s}");
            }
        }
    }
}
