//! Domain normalizers applied before the generic comparator runs.
//!
//! Adapted from the instructor/RMP name-cleaning pipeline this engine's
//! author has shipped before: decode entities, fold case, strip
//! punctuation, and otherwise get two independently-sourced values into
//! a comparable canonical shape before any similarity math happens.

use chrono::NaiveDate;
use unicode_normalization::UnicodeNormalization;

/// Case-fold and trim, collapsing internal whitespace runs to one space.
pub fn fold_case_trim(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.nfkd().collect::<String>().to_lowercase()
}

/// Lower-case and trim an email address. Does not validate syntax.
pub fn normalize_email(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Strip everything but digits, preserving a single leading `+` if present.
pub fn normalize_phone(s: &str) -> String {
    let trimmed = s.trim();
    let leading_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if leading_plus {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Case-folded, whitespace-collapsed name normalization.
pub fn normalize_name(s: &str) -> String {
    fold_case_trim(s)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%Y/%m/%d",
];

/// Parse a date in any of the commonly seen formats and return its
/// canonical `yyyy-mm-dd` string, or `None` if unparseable.
pub fn normalize_date(s: &str, extra_formats: &[String]) -> Option<String> {
    let trimmed = s.trim();
    for fmt in extra_formats.iter().map(String::as_str).chain(DATE_FORMATS.iter().copied()) {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  John.Doe@Example.COM "), "john.doe@example.com");
    }

    #[test]
    fn phone_strips_formatting_keeps_plus() {
        assert_eq!(normalize_phone("+1 (555) 010-0200"), "+15550100200");
        assert_eq!(normalize_phone("555-0100"), "5550100");
    }

    #[test]
    fn name_case_folds_and_collapses_whitespace() {
        assert_eq!(normalize_name("  JOHN   Smith "), "john smith");
    }

    #[test]
    fn date_parses_multiple_formats_to_canonical() {
        assert_eq!(normalize_date("1985-03-20", &[]).as_deref(), Some("1985-03-20"));
        assert_eq!(normalize_date("03/20/1985", &[]).as_deref(), Some("1985-03-20"));
        assert_eq!(normalize_date("March 20, 1985", &[]).as_deref(), Some("1985-03-20"));
        assert_eq!(normalize_date("not a date", &[]), None);
    }
}
