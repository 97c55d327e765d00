/// Scalar Value Module
///
/// Driver-neutral representation of a single SQL cell. Every driver decodes its
/// native cell types into [`Value`]; the reader then coerces the value into the
/// [`ScalarKind`] chosen for the column from its declared database type.
use crate::core::{DataReaderError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// The six scalar kinds a column can be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Text,
    Float,
    Bool,
    Int32,
    Int64,
    Timestamp,
}

impl ScalarKind {
    /// Classifies a declared database type name.
    ///
    /// Matching is case-insensitive and ignores any length or precision suffix,
    /// so `varchar(20)` and `DECIMAL(10,2)` classify like `VARCHAR` and
    /// `DECIMAL`. Unrecognized names read as text.
    pub fn from_type_name(type_name: &str) -> Self {
        let base = type_name
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "VARCHAR" | "CHAR" | "TEXT" | "NVARCHAR" => ScalarKind::Text,
            "DECIMAL" | "FLOAT" | "NUMERIC" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT4"
            | "FLOAT8" | "MONEY" | "SMALLMONEY" => ScalarKind::Float,
            "BOOL" | "BOOLEAN" | "BIT" => ScalarKind::Bool,
            "INT" | "INTEGER" | "INT4" | "INT2" | "SMALLINT" | "TINYINT" => ScalarKind::Int32,
            "BIGINT" | "INT8" => ScalarKind::Int64,
            "DATE" | "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" => {
                ScalarKind::Timestamp
            }
            _ => ScalarKind::Text,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Text => "text",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A nullable scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Timestamp(NaiveDateTime),
}

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind this value already has, `None` for NULL.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ScalarKind::Text),
            Value::Float(_) => Some(ScalarKind::Float),
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Int32(_) => Some(ScalarKind::Int32),
            Value::Int64(_) => Some(ScalarKind::Int64),
            Value::Timestamp(_) => Some(ScalarKind::Timestamp),
        }
    }

    fn label(&self) -> String {
        match self.kind() {
            Some(kind) => kind.to_string(),
            None => "null".to_string(),
        }
    }

    /// Converts the value into `kind`, returning `None` when the value has no
    /// faithful representation there. NULL converts to every kind.
    pub fn coerce(self, kind: ScalarKind) -> Option<Value> {
        if self.is_null() || self.kind() == Some(kind) {
            return Some(self);
        }

        match kind {
            ScalarKind::Text => Some(Value::Text(self.to_string())),
            ScalarKind::Float => match self {
                Value::Int32(i) => Some(Value::Float(f64::from(i))),
                Value::Int64(i) => Some(Value::Float(i as f64)),
                Value::Text(s) => s.trim().parse::<f64>().ok().map(Value::Float),
                _ => None,
            },
            ScalarKind::Bool => match self {
                Value::Int32(i) => int_to_bool(i64::from(i)),
                Value::Int64(i) => int_to_bool(i),
                Value::Float(f) if f == 0.0 || f == 1.0 => Some(Value::Bool(f == 1.0)),
                Value::Text(s) => parse_bool(s.trim()).map(Value::Bool),
                _ => None,
            },
            ScalarKind::Int32 => match self {
                Value::Int64(i) => i32::try_from(i).ok().map(Value::Int32),
                Value::Float(f) => float_to_int(f)
                    .and_then(|i| i32::try_from(i).ok())
                    .map(Value::Int32),
                Value::Text(s) => s.trim().parse::<i32>().ok().map(Value::Int32),
                _ => None,
            },
            ScalarKind::Int64 => match self {
                Value::Int32(i) => Some(Value::Int64(i64::from(i))),
                Value::Float(f) => float_to_int(f).map(Value::Int64),
                Value::Text(s) => s.trim().parse::<i64>().ok().map(Value::Int64),
                _ => None,
            },
            ScalarKind::Timestamp => match self {
                Value::Text(s) => parse_timestamp(s.trim()).map(Value::Timestamp),
                Value::Int32(secs) => unix_seconds(i64::from(secs)),
                Value::Int64(secs) => unix_seconds(secs),
                _ => None,
            },
        }
    }

    /// Parses a command-line literal: `NULL`, a boolean, an integer, a finite
    /// float, or else text.
    pub fn parse_literal(input: &str) -> Value {
        if input.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Some(b) = match input {
            "true" | "TRUE" => Some(true),
            "false" | "FALSE" => Some(false),
            _ => None,
        } {
            return Value::Bool(b);
        }
        if let Ok(i) = input.parse::<i64>() {
            return Value::Int64(i);
        }
        match input.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(input.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) => f.write_str(s),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

fn int_to_bool(i: i64) -> Option<Value> {
    match i {
        0 => Some(Value::Bool(false)),
        1 => Some(Value::Bool(true)),
        _ => None,
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn unix_seconds(secs: i64) -> Option<Value> {
    DateTime::from_timestamp(secs, 0).map(|dt| Value::Timestamp(dt.naive_utc()))
}

/// Type-tagged scan destination for one column.
///
/// The kind is fixed when the slot is created; the held value is always NULL
/// or of that kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    kind: ScalarKind,
    value: Value,
}

impl Slot {
    pub fn new(kind: ScalarKind) -> Self {
        Slot {
            kind,
            value: Value::Null,
        }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn clear(&mut self) {
        self.value = Value::Null;
    }

    /// Stores a raw driver value, coercing it to the slot's kind.
    ///
    /// On failure the slot is left NULL and a `SchemaContract` error naming
    /// `column` is returned.
    pub fn store(&mut self, raw: Value, column: &str) -> Result<()> {
        let label = raw.label();
        match raw.coerce(self.kind) {
            Some(value) => {
                self.value = value;
                Ok(())
            }
            None => {
                self.value = Value::Null;
                Err(DataReaderError::SchemaContract(format!(
                    "column '{}': cannot scan {} value into {}",
                    column, label, self.kind
                )))
            }
        }
    }
}
