//! Dynamically typed bind values and the field conversion trait.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// A single bind parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    NaiveTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Uuid(Uuid),
    Json(serde_json::Value),
}

/// The storage shape of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Timestamp,
    NaiveTimestamp,
    Date,
    Uuid,
    Json,
}

impl ValueKind {
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_time(self) -> bool {
        matches!(self, Self::Timestamp | Self::NaiveTimestamp | Self::Date)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamptz",
            Self::NaiveTimestamp => "timestamp",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

impl Value {
    /// The kind of a non-null value.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => ValueKind::Bool,
            Self::I16(_) => ValueKind::I16,
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::NaiveTimestamp(_) => ValueKind::NaiveTimestamp,
            Self::Date(_) => ValueKind::Date,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Json(_) => ValueKind::Json,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload of any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to `kind` when the conversion is lossless. `Null` passes through.
    pub fn coerce(self, kind: ValueKind) -> Result<Value, String> {
        if self.kind().is_none_or(|k| k == kind) {
            return Ok(self);
        }
        let out_of_range = |v: i64| format!("integer {v} out of range for {kind}");
        match (kind, &self) {
            (ValueKind::I16, _) if self.as_i64().is_some() => {
                let v = self.as_i64().unwrap_or_default();
                i16::try_from(v).map(Value::I16).map_err(|_| out_of_range(v))
            }
            (ValueKind::I32, _) if self.as_i64().is_some() => {
                let v = self.as_i64().unwrap_or_default();
                i32::try_from(v).map(Value::I32).map_err(|_| out_of_range(v))
            }
            (ValueKind::I64, _) if self.as_i64().is_some() => {
                Ok(Value::I64(self.as_i64().unwrap_or_default()))
            }
            (ValueKind::F64, Value::F32(v)) => Ok(Value::F64(f64::from(*v))),
            (ValueKind::Uuid, Value::Text(s)) => Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| e.to_string()),
            (ValueKind::NaiveTimestamp, Value::Timestamp(ts)) => {
                Ok(Value::NaiveTimestamp(ts.naive_utc()))
            }
            (ValueKind::Timestamp, Value::NaiveTimestamp(ts)) => {
                Ok(Value::Timestamp(ts.and_utc()))
            }
            _ => Err(format!("cannot convert {self:?} to {kind}")),
        }
    }

    /// Parse a `default:` directive literal into a value of `kind`.
    pub fn parse_literal(kind: ValueKind, literal: &str) -> Result<Value, String> {
        let bad = |e: &dyn fmt::Display| format!("invalid {kind} literal `{literal}`: {e}");
        let value = match kind {
            ValueKind::Bool => Value::Bool(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::I16 => Value::I16(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::I32 => Value::I32(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::I64 => Value::I64(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::F32 => Value::F32(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::F64 => Value::F64(literal.parse().map_err(|e| bad(&e))?),
            ValueKind::Text => Value::Text(literal.to_string()),
            ValueKind::Bytes => Value::Bytes(literal.as_bytes().to_vec()),
            ValueKind::Timestamp => Value::Timestamp(
                DateTime::parse_from_rfc3339(literal)
                    .map_err(|e| bad(&e))?
                    .with_timezone(&Utc),
            ),
            ValueKind::NaiveTimestamp => Value::NaiveTimestamp(
                NaiveDateTime::parse_from_str(literal, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M:%S"))
                    .map_err(|e| bad(&e))?,
            ),
            ValueKind::Date => Value::Date(
                NaiveDate::parse_from_str(literal, "%Y-%m-%d").map_err(|e| bad(&e))?,
            ),
            ValueKind::Uuid => Value::Uuid(Uuid::parse_str(literal).map_err(|e| bad(&e))?),
            ValueKind::Json => Value::Json(serde_json::from_str(literal).map_err(|e| bad(&e))?),
        };
        Ok(value)
    }

    /// The current time shaped for a column of `kind`, if that kind can hold a time.
    pub fn now(kind: ValueKind) -> Option<Value> {
        let now = Utc::now();
        match kind {
            ValueKind::Timestamp => Some(Value::Timestamp(now)),
            ValueKind::NaiveTimestamp => Some(Value::NaiveTimestamp(now.naive_utc())),
            ValueKind::Date => Some(Value::Date(now.date_naive())),
            ValueKind::I64 => Some(Value::I64(now.timestamp())),
            ValueKind::I32 => i32::try_from(now.timestamp()).ok().map(Value::I32),
            _ => None,
        }
    }
}

/// Conversion between a Rust field type and [`Value`].
///
/// `is_zero` follows the "unset" notion used for default application and for
/// record-based conditions: `None`, `0`, `""`, `false`, empty bytes and the
/// type's `Default` value all count as zero.
pub trait SqlField: Default + Sized {
    const KIND: ValueKind;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn is_zero(&self) -> bool;

    fn from_value(value: Value) -> Result<Self, String>;
}

fn unexpected(kind: ValueKind, value: &Value) -> String {
    format!("expected {kind}, found {value:?}")
}

macro_rules! impl_sql_field {
    ($ty:ty, $kind:ident) => {
        impl SqlField for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn to_value(&self) -> Value {
                Value::$kind(self.clone())
            }

            fn is_zero(&self) -> bool {
                *self == <$ty>::default()
            }

            fn from_value(value: Value) -> Result<Self, String> {
                match value.coerce(ValueKind::$kind)? {
                    Value::$kind(v) => Ok(v),
                    other => Err(unexpected(ValueKind::$kind, &other)),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$kind(v)
            }
        }
    };
}

impl_sql_field!(bool, Bool);
impl_sql_field!(i16, I16);
impl_sql_field!(i32, I32);
impl_sql_field!(i64, I64);
impl_sql_field!(f32, F32);
impl_sql_field!(f64, F64);
impl_sql_field!(String, Text);
impl_sql_field!(Vec<u8>, Bytes);
impl_sql_field!(DateTime<Utc>, Timestamp);
impl_sql_field!(NaiveDateTime, NaiveTimestamp);
impl_sql_field!(NaiveDate, Date);
impl_sql_field!(Uuid, Uuid);
impl_sql_field!(serde_json::Value, Json);

impl<T: SqlField> SqlField for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, SqlField::to_value)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::I64(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a `Vec<Value>` of positional arguments.
///
/// ```ignore
/// let params = chainorm::args!["alice", 30_i64, None::<String>];
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}
