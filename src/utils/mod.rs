//! Common utilities and helper functions
//!
//! Text clean-up shared by the center catalog and the point loaders.

use regex::Regex;
use std::sync::OnceLock;

/// Collapse runs of whitespace and trim
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Split a trailing house number off a street field
///
/// `"Rua das Flores, 123"` becomes `("Rua das Flores", Some("123"))`.
/// Suffixes such as `123A` or `45-B` are kept with the number.
pub fn split_street_number(street: &str) -> (String, Option<String>) {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

    let re = NUMBER_RE.get_or_init(|| {
        Regex::new(r"^(.*?)[, ]+(\d+[A-Za-z\-/]*)$").expect("Invalid regex pattern")
    });

    let street = street.trim();
    match re.captures(street) {
        Some(caps) => (
            caps[1].trim().to_string(),
            Some(caps[2].trim().to_string()),
        ),
        None => (street.to_string(), None),
    }
}

/// Keep only ASCII digits (tax ids, postal codes)
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Format a duration in seconds as a short human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0} ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.2} s")
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{minutes:.0} min {:.0} s", secs - minutes * 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Rua   A \t 10 "), "Rua A 10");
        assert_eq!(normalize_whitespace("linha\n\nnova"), "linha nova");
    }

    #[test]
    fn test_split_street_number() {
        assert_eq!(
            split_street_number("Rua das Flores, 123"),
            ("Rua das Flores".to_string(), Some("123".to_string()))
        );
        assert_eq!(
            split_street_number("Av. Brasil 45-B"),
            ("Av. Brasil".to_string(), Some("45-B".to_string()))
        );
        assert_eq!(
            split_street_number("Travessa Sem Numero"),
            ("Travessa Sem Numero".to_string(), None)
        );
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("12.345.678/0001-90"), "12345678000190");
        assert_eq!(digits_only(""), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.25), "250 ms");
        assert_eq!(format_duration(2.5), "2.50 s");
        assert_eq!(format_duration(125.0), "2 min 5 s");
    }
}
