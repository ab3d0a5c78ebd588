//! Tolerant parsing of raw sample values from the metrics backend.

/// Parse a raw value string. Accepts plain and scientific notation, a
/// trailing `%` (values > 1 are divided by 100, values ≤ 1 are taken as
/// already fractional), and a trailing `m` (milli, divided by 1000).
/// Returns None when the string is not a number.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // Scientific notation carries its own exponent marker; parse as-is.
    if raw.contains('e') || raw.contains('E') {
        return raw.parse::<f64>().ok();
    }

    if let Some(stripped) = raw.strip_suffix('%') {
        let v = stripped.trim().parse::<f64>().ok()?;
        return Some(if v > 1.0 { v / 100.0 } else { v });
    }

    if let Some(stripped) = raw.strip_suffix('m') {
        let v = stripped.trim().parse::<f64>().ok()?;
        return Some(v / 1000.0);
    }

    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_scientific() {
        assert_eq!(parse_sample_value("42.5"), Some(42.5));
        assert_eq!(parse_sample_value("1.5e3"), Some(1500.0));
        assert_eq!(parse_sample_value("2E-2"), Some(0.02));
    }

    #[test]
    fn percent_handling() {
        assert_eq!(parse_sample_value("85%"), Some(0.85));
        assert_eq!(parse_sample_value("0.85%"), Some(0.85));
    }

    #[test]
    fn milli_suffix() {
        assert_eq!(parse_sample_value("250m"), Some(0.25));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_sample_value(""), None);
        assert_eq!(parse_sample_value("NaN%x"), None);
        assert_eq!(parse_sample_value("abc"), None);
    }
}
