//! Kubernetes resource quantity parsing
//!
//! Handles the suffix forms the API server emits: binary (`Ki`..`Ei`),
//! decimal (`n`, `u`, `m`, `k`..`E`) and exponent notation (`1e3`).

use crate::error::{DeschedulerError, DeschedulerResult};

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a quantity into its base unit (cores, bytes, count)
pub fn parse_quantity(raw: &str) -> DeschedulerResult<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DeschedulerError::Quantity("empty quantity".to_string()));
    }

    let (number, multiplier) = split_suffix(s);

    let value: f64 = number
        .parse()
        .map_err(|_| DeschedulerError::Quantity(raw.to_string()))?;

    let scaled = value * multiplier;
    if !scaled.is_finite() || scaled < 0.0 {
        return Err(DeschedulerError::Quantity(raw.to_string()));
    }

    Ok(scaled)
}

fn split_suffix(s: &str) -> (&str, f64) {
    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            return (number, *multiplier);
        }
    }

    // `1E` is exa, `1e3` / `1E3` is exponent notation and parses as-is
    for (suffix, multiplier) in DECIMAL_SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            return (number, *multiplier);
        }
    }

    (s, 1.0)
}

/// Round up, ignoring float noise from the suffix multiplication
fn ceil_whole(value: f64) -> u64 {
    (value - 1e-6).ceil().max(0.0) as u64
}

/// CPU quantity in millicores, rounded up
pub fn cpu_millis(raw: &str) -> DeschedulerResult<u64> {
    Ok(ceil_whole(parse_quantity(raw)? * 1000.0))
}

/// Memory quantity in bytes, rounded up
pub fn memory_bytes(raw: &str) -> DeschedulerResult<u64> {
    Ok(ceil_whole(parse_quantity(raw)?))
}

/// Plain integer count (e.g. the `pods` capacity)
pub fn count(raw: &str) -> DeschedulerResult<u64> {
    Ok(parse_quantity(raw)?.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_quantities() {
        assert_eq!(cpu_millis("250m").unwrap(), 250);
        assert_eq!(cpu_millis("2").unwrap(), 2000);
        assert_eq!(cpu_millis("0.5").unwrap(), 500);
        assert_eq!(cpu_millis("1500000u").unwrap(), 1500);
    }

    #[test]
    fn test_memory_quantities() {
        assert_eq!(memory_bytes("512Mi").unwrap(), 512 * 1024 * 1024);
        assert_eq!(memory_bytes("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(memory_bytes("1G").unwrap(), 1_000_000_000);
        assert_eq!(memory_bytes("128974848").unwrap(), 128_974_848);
        assert_eq!(memory_bytes("100k").unwrap(), 100_000);
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(memory_bytes("1e3").unwrap(), 1000);
        assert_eq!(memory_bytes("1E3").unwrap(), 1000);
    }

    #[test]
    fn test_pod_count() {
        assert_eq!(count("110").unwrap(), 110);
    }

    #[test]
    fn test_invalid_quantities() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("12Qi").is_err());
    }
}
