use chrono::NaiveDateTime;
use std::borrow::Cow;
use std::fmt;
use tiberius::ColumnData;

/// A single SQL value, used both for query parameters and fetched cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

/// Parameter values for one statement.
///
/// `Row` binds a single parameter tuple; `Batch` replays the statement once
/// per inner row, the multi-row insert dispatch. The distinction the original
/// interface made by sniffing the runtime shape of its argument is a tagged
/// type here.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Row(Vec<Value>),
    Batch(Vec<Vec<Value>>),
}

impl Params {
    pub fn row(values: impl Into<Vec<Value>>) -> Self {
        Params::Row(values.into())
    }

    pub fn batch(rows: impl Into<Vec<Vec<Value>>>) -> Self {
        Params::Batch(rows.into())
    }
}

// Typed TDS parameter binding. Values are sent as protocol-level parameters,
// never interpolated into SQL text.
impl tiberius::ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int(n) => ColumnData::I32(Some(*n)),
            Value::BigInt(n) => ColumnData::I64(Some(*n)),
            Value::Float(n) => ColumnData::F64(Some(*n)),
            Value::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Bytes(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            // ISO 8601 text; SQL Server converts it natively and the value is
            // still a typed parameter, so no injection surface is opened.
            Value::DateTime(dt) => ColumnData::String(Some(Cow::Owned(
                dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "0x{}", hex_string(b)),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::BigInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiberius::ToSql;

    #[test]
    fn null_binds_as_absent_string() {
        assert!(matches!(Value::Null.to_sql(), ColumnData::String(None)));
    }

    #[test]
    fn integers_bind_with_native_width() {
        assert!(matches!(
            Value::Int(100_000).to_sql(),
            ColumnData::I32(Some(100_000))
        ));
        assert!(matches!(
            Value::BigInt(1_000_000_000).to_sql(),
            ColumnData::I64(Some(1_000_000_000))
        ));
    }

    #[test]
    fn text_binds_borrowed_including_metacharacters() {
        // Metacharacters are harmless: the value travels as a typed
        // parameter, not as SQL text.
        let v = Value::Text("x'; DROP TABLE users--".into());
        if let ColumnData::String(Some(cow)) = v.to_sql() {
            assert_eq!(&*cow, "x'; DROP TABLE users--");
        } else {
            panic!("Expected String ColumnData");
        }
    }

    #[test]
    fn datetime_binds_as_iso_text() {
        let dt = chrono::NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        if let ColumnData::String(Some(cow)) = Value::DateTime(dt).to_sql() {
            assert!(cow.starts_with("2025-01-15T12:30:45"));
        } else {
            panic!("Expected String ColumnData");
        }
    }

    #[test]
    fn display_renders_bytes_as_hex() {
        assert_eq!(Value::Bytes(vec![0xDE, 0xAD]).to_string(), "0xdead");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
