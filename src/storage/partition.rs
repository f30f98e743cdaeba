//! Hive-style partition directory naming (`col=value/`).

use crate::error::Result;
use polars::prelude::*;
use std::path::PathBuf;

/// Directory value used for null partition keys
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Relative directory for the partition a single-key-group frame belongs to.
///
/// `group` must contain rows sharing one combination of `partition_by`
/// values; the first row decides the path.
pub fn partition_path(group: &DataFrame, partition_by: &[&str]) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for name in partition_by {
        let value = group.column(name)?.get(0)?;
        path.push(format!("{}={}", name, partition_value(&value)));
    }
    Ok(path)
}

pub fn partition_value(value: &AnyValue) -> String {
    let raw = match value {
        AnyValue::Null => return NULL_PARTITION.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    };
    if raw.is_empty() {
        return NULL_PARTITION.to_string();
    }
    escape_path_value(&raw)
}

/// Percent-escape characters that would break a single path segment
fn escape_path_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '/' | '\\' | '=' | '%' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '\n' | '\r' => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("%{:02X}", byte));
                }
            }
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_path_uses_first_row_values() {
        let df = df! [
            "year" => [2018i32, 2018],
            "month" => [11i32, 11],
            "userId" => ["1", "2"]
        ].unwrap();

        let path = partition_path(&df, &["year", "month"]).unwrap();
        assert_eq!(path, PathBuf::from("year=2018/month=11"));
    }

    #[test]
    fn test_null_value_maps_to_sentinel() {
        assert_eq!(partition_value(&AnyValue::Null), NULL_PARTITION);
        assert_eq!(partition_value(&AnyValue::String("")), NULL_PARTITION);
    }

    #[test]
    fn test_unsafe_characters_are_escaped() {
        assert_eq!(partition_value(&AnyValue::String("AC/DC")), "AC%2FDC");
        assert_eq!(partition_value(&AnyValue::String("a=b")), "a%3Db");
        assert_eq!(partition_value(&AnyValue::String("ARJIE2Y1187B994AB7")), "ARJIE2Y1187B994AB7");
    }
}
