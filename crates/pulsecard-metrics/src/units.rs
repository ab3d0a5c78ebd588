//! Scalar conversion between compatible unit families.
//!
//! Two families: byte-scale (decimal and binary prefixes) and time-scale
//! (nanoseconds through days). Cross-family conversion is an error; the
//! caller keeps the original value in that case.

use pulsecard_core::{PulsecardError, Result};

/// Convert `value` between two units of the same family. Empty or equal
/// units pass the value through unchanged.
pub fn convert_unit(value: f64, from: &str, to: &str) -> Result<f64> {
    if from.is_empty() || to.is_empty() || from.eq_ignore_ascii_case(to) {
        return Ok(value);
    }
    let from = from.trim().to_ascii_lowercase();
    let to = to.trim().to_ascii_lowercase();

    match (byte_ratio(&from), byte_ratio(&to)) {
        (Some(f), Some(t)) => return Ok(value * f / t),
        (Some(_), None) | (None, Some(_)) => {
            return Err(PulsecardError::Unit(format!(
                "cannot convert between unit families: {from} -> {to}"
            )));
        }
        (None, None) => {}
    }
    match (time_ratio(&from), time_ratio(&to)) {
        (Some(f), Some(t)) => Ok(value * f / t),
        _ => Err(PulsecardError::Unit(format!(
            "unknown unit pair: {from} -> {to}"
        ))),
    }
}

/// Bytes represented by one unit of `unit`, or None if not a byte unit.
fn byte_ratio(unit: &str) -> Option<f64> {
    let r = match unit {
        "b" | "byte" | "bytes" => 1.0,
        // decimal (1000)
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        "pb" => 1e15,
        "eb" => 1e18,
        // binary (1024)
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "tib" => 1024f64.powi(4),
        "pib" => 1024f64.powi(5),
        "eib" => 1024f64.powi(6),
        _ => return None,
    };
    Some(r)
}

/// Nanoseconds represented by one unit of `unit`, or None if not a time unit.
fn time_ratio(unit: &str) -> Option<f64> {
    let r = match unit {
        "ns" | "nanosecond" | "nanoseconds" => 1.0,
        "us" | "μs" | "microsecond" | "microseconds" => 1e3,
        "ms" | "millisecond" | "milliseconds" => 1e6,
        "s" | "second" | "seconds" => 1e9,
        "m" | "min" | "minute" | "minutes" => 60.0 * 1e9,
        "h" | "hour" | "hours" => 3600.0 * 1e9,
        "d" | "day" | "days" => 86400.0 * 1e9,
        _ => return None,
    };
    Some(r)
}

/// Round to two decimal places, the display precision used throughout.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kib_round_trip() {
        let bytes = convert_unit(1024.0, "KiB", "B").unwrap();
        assert_eq!(bytes, 1_048_576.0);
        let back = convert_unit(bytes, "b", "kib").unwrap();
        assert_eq!(round2(back), 1024.0);
    }

    #[test]
    fn decimal_vs_binary() {
        assert_eq!(convert_unit(1.0, "GB", "MB").unwrap(), 1000.0);
        assert_eq!(convert_unit(1.0, "GiB", "MiB").unwrap(), 1024.0);
        // 1 GiB in decimal GB
        let gib_in_gb = convert_unit(1.0, "GiB", "GB").unwrap();
        assert_eq!(round2(gib_in_gb), 1.07);
    }

    #[test]
    fn time_units() {
        assert_eq!(convert_unit(1500.0, "ms", "s").unwrap(), 1.5);
        assert_eq!(convert_unit(2.0, "h", "minutes").unwrap(), 120.0);
        assert_eq!(convert_unit(1.0, "day", "h").unwrap(), 24.0);
    }

    #[test]
    fn same_or_empty_passes_through() {
        assert_eq!(convert_unit(7.0, "", "GB").unwrap(), 7.0);
        assert_eq!(convert_unit(7.0, "GB", "gb").unwrap(), 7.0);
    }

    #[test]
    fn cross_family_is_an_error() {
        assert!(convert_unit(1.0, "GB", "s").is_err());
        assert!(convert_unit(1.0, "ms", "MiB").is_err());
        assert!(convert_unit(1.0, "parsec", "GB").is_err());
    }
}
