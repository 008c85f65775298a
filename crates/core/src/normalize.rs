//! Conversion of display-formatted numbers ("$1.2B", "+3.25%") to `f64`.
//!
//! Both parsers are total: malformed input yields `None`, never a panic.

/// Placeholder the page shows when a value is missing.
pub const MISSING_PLACEHOLDER: char = '\u{2014}';

/// Parse a currency amount such as `$64,000` or `$1.2B`.
///
/// A single trailing `K`, `M`, `B` or `T` (case-sensitive) scales the
/// numeral by 1e3, 1e6, 1e9 or 1e12.
pub fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && *c != MISSING_PLACEHOLDER)
        .collect();
    let cleaned = cleaned.trim();

    let (numeral, multiplier) = match cleaned.chars().last() {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1e3),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('T') => (&cleaned[..cleaned.len() - 1], 1e12),
        _ => (cleaned, 1.0),
    };

    parse_finite(numeral).map(|v| v * multiplier)
}

/// Parse a signed percentage such as `+3.25%` or `-1.5%`.
pub fn parse_percent(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '%' | ',')).collect();
    let cleaned = cleaned.trim();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(cleaned);
    parse_finite(cleaned)
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
