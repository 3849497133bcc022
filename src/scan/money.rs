//! Money display strings (`"$1.2K"`, `"-$340"`) to numbers and back

use regex::Regex;

lazy_static::lazy_static! {
    /// Everything that is not a digit, decimal point, multiplier or separator
    static ref MONEY_NOISE: Regex = Regex::new(r"[^\d.KMB,]").expect("valid money regex");
}

/// Parse a money string into dollars.
///
/// `"0"`, `"-"` and empty strings are zero. Returns `None` when nothing
/// numeric is left after stripping currency symbols.
pub fn parse_money(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" || raw == "-" {
        return Some(0.0);
    }

    let negative = raw.starts_with('-') || raw.starts_with("$-");
    let upper = raw.replace('-', "").to_uppercase();
    let mut clean = MONEY_NOISE.replace_all(&upper, "").into_owned();

    let multiplier = if clean.contains('K') {
        1_000.0
    } else if clean.contains('M') {
        1_000_000.0
    } else if clean.contains('B') {
        1_000_000_000.0
    } else {
        1.0
    };
    clean.retain(|c| c.is_ascii_digit() || c == '.');

    let value = clean.parse::<f64>().ok()? * multiplier;
    Some(if negative { -value } else { value })
}

/// Format dollars the way the data source displays them
pub fn format_money(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "$0".to_string();
    }

    let magnitude = value.abs();
    let formatted = if magnitude >= 1_000_000_000.0 {
        format!("${:.1}B", magnitude / 1_000_000_000.0)
    } else if magnitude >= 1_000_000.0 {
        format!("${:.1}M", magnitude / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("${:.1}K", magnitude / 1_000.0)
    } else {
        format!("${:.0}", magnitude)
    };

    if value < 0.0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Sum money strings, ignoring the ones that don't parse
pub fn sum_money<'a>(values: impl IntoIterator<Item = &'a str>) -> f64 {
    values.into_iter().filter_map(parse_money).sum()
}
