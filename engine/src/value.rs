//! Runtime values and data types.
//!
//! Defines the [`Value`] tagged union that flows through every operator and the
//! [`DataType`] lattice used for schema declarations and type inference.

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A row of values, positionally aligned to a [`crate::Schema`].
pub type Row = Vec<Value>;

/// Declared or inferred type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// `true` / `false`.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    String,
    /// UTC instant with sub-second precision.
    Timestamp,
    /// Raw bytes.
    Binary,
    /// Type not known until execution; values of any type may appear.
    Dynamic,
}

impl DataType {
    /// Parses a SQL type name as used in `CAST(x AS type)`.
    #[must_use]
    pub fn from_sql_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Some(Self::Boolean),
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" => Some(Self::Integer),
            "REAL" | "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Some(Self::Float),
            "TEXT" | "STRING" | "VARCHAR" | "CHAR" => Some(Self::String),
            "TIMESTAMP" | "DATETIME" | "DATE" => Some(Self::Timestamp),
            "BINARY" | "BLOB" | "BYTES" => Some(Self::Binary),
            "DYNAMIC" | "ANY" => Some(Self::Dynamic),
            _ => None,
        }
    }

    /// Returns true for integer and float.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Common type two branches of a set operation can both be coerced to.
    ///
    /// Integer and float widen to float, anything combined with `dynamic`
    /// stays dynamic, and anything combined with string becomes string.
    /// Other combinations have no common type.
    #[must_use]
    pub fn common_supertype(self, other: Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Self::Dynamic, _) | (_, Self::Dynamic) => Some(Self::Dynamic),
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Some(Self::Float),
            (Self::String, _) | (_, Self::String) => Some(Self::String),
            _ => None,
        }
    }

    /// Widening rule used by schema inference: integer+float → float, any
    /// other conflict → string.
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Dynamic, t) | (t, Self::Dynamic) => t,
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Self::Float,
            _ => Self::String,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::String => write!(f, "STRING"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Binary => write!(f, "BINARY"),
            Self::Dynamic => write!(f, "DYNAMIC"),
        }
    }
}

/// A single SQL value.
///
/// `PartialEq`/`Hash` implement *key equality* (used by grouping, DISTINCT,
/// UNION and hash joins): null equals null, `1` equals `1.0` and NaN equals
/// NaN. SQL comparison semantics, where null is unknown, live in
/// [`Value::sql_compare`].
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// SQL null.
    #[default]
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Timestamp value (UTC).
    Timestamp(DateTime<Utc>),
    /// Binary blob.
    Binary(Vec<u8>),
}

impl Value {
    /// Returns true if the value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the runtime type of the value, or `None` for null.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(DataType::Boolean),
            Self::Integer(_) => Some(DataType::Integer),
            Self::Float(_) => Some(DataType::Float),
            Self::String(_) => Some(DataType::String),
            Self::Timestamp(_) => Some(DataType::Timestamp),
            Self::Binary(_) => Some(DataType::Binary),
        }
    }

    /// Interprets the value as a truth value.
    ///
    /// Numbers are true when non-zero; strings `true`/`false` are accepted.
    /// Anything else (including null) is unknown.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Numeric view of the value, coercing numeric strings.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integer view of the value; floats are truncated, numeric strings parsed.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Boolean(b) => Some(i64::from(*b)),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Textual view of the value; `None` for null.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Timestamp view of the value: timestamps as-is, strings parsed,
    /// integers read as Unix epoch seconds.
    #[must_use]
    pub fn to_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::String(s) => parse_timestamp(s),
            Self::Integer(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Float(secs) if secs.is_finite() => {
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9).round() as u32;
                DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
            }
            _ => None,
        }
    }

    /// Compares two values under SQL semantics.
    ///
    /// Returns `None` when either side is null or the values are not
    /// comparable. Numeric strings compare with numbers; timestamp strings
    /// compare with timestamps.
    #[must_use]
    pub fn sql_compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::String(s)) => parse_timestamp(s).map(|b| a.cmp(&b)),
            (Self::String(s), Self::Timestamp(b)) => parse_timestamp(s).map(|a| a.cmp(b)),
            (Self::Binary(a), Self::Binary(b)) => Some(a.cmp(b)),
            (Self::String(s), Self::Integer(_) | Self::Float(_)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|a| Self::Float(a).sql_compare(other)),
            (Self::Integer(_) | Self::Float(_), Self::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|b| self.sql_compare(&Self::Float(b))),
            _ => None,
        }
    }

    /// Total order used for sorting and MIN/MAX.
    ///
    /// Values of different kinds order by kind: null, boolean, number,
    /// timestamp, string, binary.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Integer(_) | Self::Float(_) => 2,
            Self::Timestamp(_) => 3,
            Self::String(_) => 4,
            Self::Binary(_) => 5,
        }
    }
}

/// Returns the float as an `i64` when it holds an exact integral value.
fn exact_integer(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                exact_integer(*b) == Some(*a)
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Self::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                if let Some(i) = exact_integer(*f) {
                    2u8.hash(state);
                    i.hash(state);
                } else {
                    3u8.hash(state);
                    if f.is_nan() {
                        f64::NAN.to_bits().hash(state);
                    } else {
                        f.to_bits().hash(state);
                    }
                }
            }
            Self::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Self::Timestamp(ts) => {
                5u8.hash(state);
                ts.hash(state);
            }
            Self::Binary(bytes) => {
                6u8.hash(state);
                bytes.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Binary(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Self::Float(_) => serializer.serialize_none(),
            Self::String(s) => serializer.serialize_str(s),
            Self::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Binary(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

/// Parses the timestamp layouts commonly found in logs.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`
/// (both read as UTC), bare `YYYY-MM-DD`, and the NCSA layout
/// `10/Oct/2000:13:55:36 -0700`.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_str(s, "%d/%b/%Y:%H:%M:%S %z")
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_key_equality_across_numeric_types() {
        assert_eq!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::Integer(1), Value::Float(1.5));
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));

        let mut set = HashSet::new();
        set.insert(Value::Integer(1));
        assert!(set.contains(&Value::Float(1.0)));
        assert!(!set.contains(&Value::String("1".to_string())));
    }

    #[test]
    fn test_sql_compare_null_is_unknown() {
        assert_eq!(Value::Null.sql_compare(&Value::Integer(1)), None);
        assert_eq!(Value::Integer(1).sql_compare(&Value::Null), None);
    }

    #[test]
    fn test_sql_compare_mixed_types() {
        assert_eq!(
            Value::Integer(2).sql_compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("10".to_string()).sql_compare(&Value::Integer(9)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::String("abc".to_string()).sql_compare(&Value::Integer(9)),
            None
        );
        assert_eq!(Value::Boolean(true).sql_compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_timestamp_compares_with_string() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let value = Value::Timestamp(ts);
        assert_eq!(
            value.sql_compare(&Value::from("2024-03-01 11:00:00")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            value.sql_compare(&Value::from("2024-03-01T12:00:00Z")),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_sort_cmp_orders_kinds() {
        let mut values = vec![
            Value::from("b"),
            Value::Integer(3),
            Value::Null,
            Value::Float(1.5),
            Value::Boolean(false),
        ];
        values.sort_by(Value::sort_cmp);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(false),
                Value::Float(1.5),
                Value::Integer(3),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2000, 10, 10, 20, 55, 36).unwrap();
        assert_eq!(parse_timestamp("2000-10-10 20:55:36"), Some(expected));
        assert_eq!(parse_timestamp("2000-10-10T20:55:36"), Some(expected));
        assert_eq!(parse_timestamp("2000-10-10T20:55:36Z"), Some(expected));
        assert_eq!(parse_timestamp("10/Oct/2000:13:55:36 -0700"), Some(expected));
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2000-10-10").is_some());
    }

    #[test]
    fn test_common_supertype() {
        assert_eq!(
            DataType::Integer.common_supertype(DataType::Float),
            Some(DataType::Float)
        );
        assert_eq!(
            DataType::Timestamp.common_supertype(DataType::String),
            Some(DataType::String)
        );
        assert_eq!(DataType::Boolean.common_supertype(DataType::Integer), None);
    }

    #[test]
    fn test_widen() {
        assert_eq!(DataType::Integer.widen(DataType::Float), DataType::Float);
        assert_eq!(DataType::Integer.widen(DataType::Boolean), DataType::String);
        assert_eq!(DataType::Dynamic.widen(DataType::Integer), DataType::Integer);
    }

    #[test]
    fn test_serialize_values() {
        let row = vec![
            Value::Null,
            Value::Integer(3),
            Value::from("x"),
            Value::Binary(vec![1, 2, 3]),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,3,"x","AQID"]"#);
    }

    #[test]
    fn test_display_values() {
        assert_eq!(Value::Binary(vec![0xab, 0x01]).to_string(), "0xab01");
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-01-02 03:04:05");
    }
}
