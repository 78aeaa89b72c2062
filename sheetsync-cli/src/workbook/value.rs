//! Cell value representation shared by sheets, the change log and the database layer

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp text format used in JSON documents and CLI input
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_KEY: &str = "timestamp";

/// A single cell in a sheet
///
/// Every "missing" representation (empty cell, NaN, unparsable date) is
/// normalized to [`CellValue::Null`] so equality checks see a single absent value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Parse free-form user input into the most specific value
    ///
    /// Order: empty → Null, true/false → Boolean, finite number, timestamp, string.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if s.is_empty() {
            return CellValue::Null;
        }

        match s.to_lowercase().as_str() {
            "true" => return CellValue::Boolean(true),
            "false" => return CellValue::Boolean(false),
            _ => {}
        }

        // "inf" and "NaN" parse as f64 but stay text
        if let Ok(n) = s.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }

        if let Some(ts) = parse_timestamp(s) {
            return CellValue::Timestamp(ts);
        }

        CellValue::String(s.to_string())
    }

    /// Convert to JSON for log files and CLI output
    ///
    /// Timestamps are tagged as `{"timestamp": "..."}` so that a string that
    /// happens to look like a date reads back as a string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_json::json!(*n as i64)
                } else {
                    serde_json::json!(*n)
                }
            }
            CellValue::Boolean(b) => serde_json::Value::Bool(*b),
            CellValue::Timestamp(ts) => serde_json::Value::Object(serde_json::Map::from_iter([(
                TIMESTAMP_KEY.to_string(),
                serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
            )])),
        }
    }

    /// Inverse of [`CellValue::to_json`]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Bool(b) => CellValue::Boolean(*b),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::from).unwrap_or_default(),
            serde_json::Value::String(s) => CellValue::String(s.clone()),
            serde_json::Value::Object(map) if map.len() == 1 => {
                match map.get(TIMESTAMP_KEY).and_then(|v| v.as_str()).and_then(parse_timestamp) {
                    Some(ts) => CellValue::Timestamp(ts),
                    None => CellValue::String(json.to_string()),
                }
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                CellValue::String(json.to_string())
            }
        }
    }
}

/// Accepts `2024-01-31 12:00:00`, `2024-01-31T12:00:00` and bare dates
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            CellValue::Null
        } else {
            CellValue::Number(n)
        }
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(ts: NaiveDateTime) -> Self {
        CellValue::Timestamp(ts)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(CellValue::from_json(&json))
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "(null)"),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}
