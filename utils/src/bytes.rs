//!
//! Human readable byte sizes such as `30GB` or `512 MiB`.
//!

use serde::{Deserialize, Deserializer, Serializer, de};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ByteSizeError {
    #[error("empty byte size")]
    Empty,

    #[error("invalid byte size number in '{0}'")]
    InvalidNumber(String),

    #[error("unknown byte size unit '{0}'")]
    UnknownUnit(String),

    #[error("byte size '{0}' overflows u64")]
    Overflow(String),
}

const UNITS: &[(&str, u64)] = &[
    ("B", 1),
    ("KB", 1_000),
    ("MB", 1_000_000),
    ("GB", 1_000_000_000),
    ("TB", 1_000_000_000_000),
    ("PB", 1_000_000_000_000_000),
    ("KIB", 1 << 10),
    ("MIB", 1 << 20),
    ("GIB", 1 << 30),
    ("TIB", 1 << 40),
    ("PIB", 1 << 50),
];

/// Parses a byte size with an optional decimal fraction and an SI (`KB`, `GB`) or IEC (`KiB`, `GiB`) unit.
/// A bare number is interpreted as bytes.
pub fn parse_byte_size(input: &str) -> Result<u64, ByteSizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ByteSizeError::Empty);
    }
    let split = trimmed.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number: f64 = number.parse().map_err(|_| ByteSizeError::InvalidNumber(input.to_string()))?;
    let unit = unit.trim().to_ascii_uppercase();
    let multiplier = match unit.as_str() {
        "" => 1,
        // Single letter shorthands (`30G`) follow the SI units
        "K" | "M" | "G" | "T" | "P" => UNITS.iter().find(|(u, _)| u.starts_with(&unit) && u.len() == 2).map(|(_, m)| *m).unwrap_or(1),
        _ => UNITS.iter().find(|(u, _)| *u == unit).map(|(_, m)| *m).ok_or_else(|| ByteSizeError::UnknownUnit(unit.clone()))?,
    };
    let bytes = number * multiplier as f64;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(ByteSizeError::Overflow(input.to_string()));
    }
    Ok(bytes.round() as u64)
}

/// Formats a byte count using the largest fitting SI unit, e.g. `30.00 GB`
pub fn format_byte_size(bytes: u64) -> String {
    UNITS[..6]
        .iter()
        .rev()
        .find(|(_, m)| bytes >= *m)
        .map(|(u, m)| if *m == 1 { format!("{bytes} B") } else { format!("{:.2} {u}", bytes as f64 / *m as f64) })
        .unwrap_or_else(|| "0 B".to_string())
}

/// A byte count which (de)serializes from either an integer or a human readable string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_byte_size(s).map(ByteSize)
    }
}

impl Display for ByteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_byte_size(self.0))
    }
}

impl From<ByteSize> for u64 {
    fn from(value: ByteSize) -> Self {
        value.0
    }
}

impl serde::Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a byte count or a size string such as \"30GB\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v).map(ByteSize).map_err(|_| E::custom(format!("negative byte size {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte_size() {
        let tests = [
            ("0", 0),
            ("1024", 1024),
            ("30GB", 30_000_000_000),
            ("30 gb", 30_000_000_000),
            ("1.5KB", 1_500),
            ("512MiB", 512 * 1024 * 1024),
            ("2G", 2_000_000_000),
            ("7 B", 7),
        ];
        for (input, expected) in tests {
            assert_eq!(parse_byte_size(input), Ok(expected), "input: {input}");
        }
    }

    #[test]
    fn test_parse_byte_size_errors() {
        assert_eq!(parse_byte_size("  "), Err(ByteSizeError::Empty));
        assert!(matches!(parse_byte_size("GB"), Err(ByteSizeError::InvalidNumber(_))));
        assert!(matches!(parse_byte_size("12XB"), Err(ByteSizeError::UnknownUnit(_))));
    }

    #[test]
    fn test_byte_size_serde() {
        let size: ByteSize = serde_json::from_str("\"30GB\"").unwrap();
        assert_eq!(size, ByteSize(30_000_000_000));
        let size: ByteSize = serde_json::from_str("4096").unwrap();
        assert_eq!(size.0, 4096);
        assert_eq!(ByteSize(30_000_000_000).to_string(), "30.00 GB");
        assert_eq!(ByteSize(12).to_string(), "12 B");
    }
}
