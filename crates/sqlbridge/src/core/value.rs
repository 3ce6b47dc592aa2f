//! SQL value representation and semantic-type-driven literal formatting.
//!
//! [`SqlValue`] is the owned, loosely-typed value exchanged with the injected
//! executor. [`format_value`] renders a value as a SQL literal for a declared
//! [`SemanticType`]; the rendering rules are dialect-independent, so every
//! transformer shares this one implementation.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::schema::SemanticType;
use crate::error::{BridgeError, Result};

/// Owned SQL value enum for row handling and literal rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Borrow text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content of an integer-family value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I32(v) => Some(i64::from(*v)),
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Short debug rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => format!("<{} bytes>", b.len()),
            other => format!("{:?}", other),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

/// Escape a string body for a single-quoted SQL literal.
///
/// Backslash, both quote characters, backtick, CR and LF are escaped so the
/// literal survives re-parsing by the target engine byte-for-byte.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Render a float with fixed 15 significant digits.
fn format_float(v: f64) -> Result<String> {
    if !v.is_finite() {
        return Err(BridgeError::format("float", v.to_string()));
    }
    if v == 0.0 {
        return Ok("0".to_string());
    }
    let digits_before = v.abs().log10().floor() as i64 + 1;
    let decimals = (15 - digits_before).max(0) as usize;
    Ok(format!("{:.*}", decimals, v))
}

/// Render a value as a SQL literal for its declared semantic type.
///
/// The semantic type is the source of truth: an unrecognized type/value
/// combination is a [`BridgeError::FormatFailure`], never a silent coercion.
pub fn format_value(semantic: SemanticType, value: &SqlValue) -> Result<String> {
    if value.is_null() {
        return Ok("NULL".to_string());
    }
    match (semantic, value) {
        (SemanticType::String, SqlValue::Text(s)) => Ok(format!("'{}'", escape_string(s))),
        (SemanticType::Uuid, SqlValue::Uuid(u)) => Ok(format!("'{}'", u)),
        (SemanticType::Uuid, SqlValue::Text(s)) => Ok(format!("'{}'", escape_string(s))),

        (SemanticType::Int, SqlValue::I32(v)) => Ok(v.to_string()),
        (SemanticType::Int, SqlValue::I64(v)) => Ok(v.to_string()),
        // Floats truncate toward zero under an integer type.
        (SemanticType::Int, SqlValue::F64(v)) => Ok((v.trunc() as i64).to_string()),

        (SemanticType::Float, SqlValue::F64(v)) => format_float(*v),
        (SemanticType::Float, SqlValue::I32(v)) => format_float(f64::from(*v)),
        (SemanticType::Float, SqlValue::I64(v)) => format_float(*v as f64),

        (SemanticType::Decimal, SqlValue::Decimal(d)) => Ok(d.to_string()),
        (SemanticType::Decimal, SqlValue::I64(v)) => Ok(v.to_string()),
        (SemanticType::Decimal, SqlValue::I32(v)) => Ok(v.to_string()),

        (SemanticType::Time, SqlValue::DateTime(dt)) => {
            Ok(format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")))
        }
        (SemanticType::Time, SqlValue::Date(d)) => Ok(format!("'{}'", d.format("%Y-%m-%d"))),
        // Pre-formatted timestamp text is passed through quoted.
        (SemanticType::Time, SqlValue::Text(s)) => Ok(format!("'{}'", escape_string(s))),

        (SemanticType::Binary, SqlValue::Bytes(b)) => {
            if b.is_empty() {
                Ok("''".to_string())
            } else {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                Ok(format!("0x{}", hex))
            }
        }

        // JSON is passed through as a quoted string, no re-validation.
        (SemanticType::Json, SqlValue::Json(j)) => Ok(format!("'{}'", escape_string(&j.to_string()))),
        (SemanticType::Json, SqlValue::Text(s)) => Ok(format!("'{}'", escape_string(s))),

        (SemanticType::Bit, SqlValue::Bool(b)) => {
            Ok(if *b { "b'1'" } else { "b'0'" }.to_string())
        }
        (SemanticType::Bit, v) => match v.as_i64() {
            Some(0) => Ok("b'0'".to_string()),
            Some(1) => Ok("b'1'".to_string()),
            _ => Err(BridgeError::format("bit", v.describe())),
        },

        (SemanticType::Bool, SqlValue::Bool(b)) => {
            Ok(if *b { "TRUE" } else { "FALSE" }.to_string())
        }

        (sem, v) => Err(BridgeError::format(sem.to_string(), v.describe())),
    }
}

/// Convert a raw driver value into the caller-facing normalized form:
/// byte sequences become text, timestamps become `YYYY-MM-DD HH:MM:SS`.
///
/// The strict variant additionally renders numeric, boolean, decimal, uuid
/// and json values as text, producing a uniform string-keyed row for
/// reference-SQL rewriting.
pub fn normalize_value(value: SqlValue, strict: bool) -> SqlValue {
    match value {
        SqlValue::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        SqlValue::DateTime(dt) => SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        SqlValue::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::I32(v) if strict => SqlValue::Text(v.to_string()),
        SqlValue::I64(v) if strict => SqlValue::Text(v.to_string()),
        SqlValue::F64(v) if strict => SqlValue::Text(v.to_string()),
        SqlValue::Bool(v) if strict => SqlValue::Text(if v { "1" } else { "0" }.to_string()),
        SqlValue::Decimal(v) if strict => SqlValue::Text(v.to_string()),
        SqlValue::Uuid(v) if strict => SqlValue::Text(v.to_string()),
        SqlValue::Json(v) if strict => SqlValue::Text(v.to_string()),
        other => other,
    }
}
