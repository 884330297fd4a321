//! Field typing and coercion.
//!
//! A store is configured with a map from field names to type names. On every
//! ingestion path (add, insert, update, load) the named fields are coerced to
//! their target type. All three date spellings (`Date`, `ISODate`, `ASPDate`,
//! plus `Moment` for compatibility) are stored internally as [`Value::Date`],
//! so a field can be converted from any date representation to any other.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::record::Record;
use crate::value::Value;

/// Recognized schema type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Number,
    String,
    Date,
    IsoDate,
    AspDate,
}

impl FieldType {
    /// The type a value of this schema type is stored as. Date-like types
    /// collapse to `Date` so conversions between them stay lossless.
    pub(crate) fn storage(self) -> FieldType {
        match self {
            FieldType::IsoDate | FieldType::AspDate => FieldType::Date,
            other => other,
        }
    }
}

impl FromStr for FieldType {
    type Err = TypeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "bool" | "boolean" | "Boolean" => Ok(FieldType::Bool),
            "number" | "Number" => Ok(FieldType::Number),
            "string" | "String" => Ok(FieldType::String),
            "Date" | "Moment" => Ok(FieldType::Date),
            "ISODate" => Ok(FieldType::IsoDate),
            "ASPDate" => Ok(FieldType::AspDate),
            _ => Err(TypeError::UnknownType {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "Boolean",
            FieldType::Number => "Number",
            FieldType::String => "String",
            FieldType::Date => "Date",
            FieldType::IsoDate => "ISODate",
            FieldType::AspDate => "ASPDate",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while compiling a type map or coercing a value.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TypeError {
    /// A configured type name is not one of the recognized names.
    #[error("unknown field type \"{name}\"")]
    UnknownType { name: String },

    /// A value could not be converted to its configured type.
    #[error("cannot convert {value} ({found}) to type {target}")]
    ConversionFailed {
        value: String,
        found: &'static str,
        target: FieldType,
    },
}

impl TypeError {
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, TypeError::UnknownType { .. })
    }

    pub fn is_conversion_error(&self) -> bool {
        matches!(self, TypeError::ConversionFailed { .. })
    }
}

impl From<TypeError> for crate::Error {
    fn from(err: TypeError) -> Self {
        crate::Error::Type(err)
    }
}

/// A compiled field-type map.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, FieldType>,
}

impl Schema {
    /// Compiles a name -> type-name map, failing on unrecognized type names.
    pub fn compile(types: &HashMap<String, String>) -> Result<Schema, TypeError> {
        let mut compiled = HashMap::with_capacity(types.len());
        for (field, name) in types {
            compiled.insert(field.clone(), FieldType::from_str(name)?.storage());
        }
        Ok(Schema { types: compiled })
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.types.get(field).copied()
    }

    /// Coerces every typed field of the record in place. Untyped fields are
    /// left untouched.
    pub fn coerce(&self, record: &mut Record) -> Result<(), TypeError> {
        if self.types.is_empty() {
            return Ok(());
        }
        for (field, ty) in &self.types {
            if let Some(value) = record.get(field) {
                let converted = convert(value.clone(), *ty)?;
                record.set(field.clone(), converted);
            }
        }
        Ok(())
    }
}

/// Converts a single value to the given type.
///
/// `Null` passes through unchanged for every target type. Strings convert to
/// dates by recognizing the ASP.NET `/Date(ms)/` pattern, RFC 3339, and the
/// common `YYYY-MM-DD [HH:MM:SS]` forms; a bare date lands at midnight UTC.
pub fn convert(value: Value, ty: FieldType) -> Result<Value, TypeError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match ty.storage() {
        FieldType::Bool => Ok(Value::Bool(value.truthy())),
        FieldType::Number => to_number(value),
        FieldType::String => to_string(value),
        _ => to_date(value),
    }
}

fn fail(value: &Value, target: FieldType) -> TypeError {
    TypeError::ConversionFailed {
        value: value.to_string(),
        found: value.type_name(),
        target,
    }
}

fn to_number(value: Value) -> Result<Value, TypeError> {
    match &value {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(_) | Value::Float(_) => Ok(value),
        Value::Str(s) => {
            if let Ok(n) = s.trim().parse::<i64>() {
                Ok(Value::Int(n))
            } else if let Ok(f) = s.trim().parse::<f64>() {
                Ok(Value::Float(f))
            } else {
                Err(fail(&value, FieldType::Number))
            }
        }
        Value::Date(d) => Ok(Value::Int(d.timestamp_millis())),
        _ => Err(fail(&value, FieldType::Number)),
    }
}

fn to_string(value: Value) -> Result<Value, TypeError> {
    match &value {
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Date(_) => {
            Ok(Value::Str(value.to_string()))
        }
        Value::Str(_) => Ok(value),
        _ => Err(fail(&value, FieldType::String)),
    }
}

fn to_date(value: Value) -> Result<Value, TypeError> {
    match &value {
        Value::Int(ms) => DateTime::from_timestamp_millis(*ms)
            .map(Value::Date)
            .ok_or_else(|| fail(&value, FieldType::Date)),
        Value::Float(ms) => DateTime::from_timestamp_millis(*ms as i64)
            .map(Value::Date)
            .ok_or_else(|| fail(&value, FieldType::Date)),
        Value::Date(_) => Ok(value),
        Value::Str(s) => parse_date_str(s)
            .map(Value::Date)
            .ok_or_else(|| fail(&value, FieldType::Date)),
        _ => Err(fail(&value, FieldType::Date)),
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(ms) = parse_asp_date(s) {
        return DateTime::from_timestamp_millis(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Parses the ASP.NET JSON date pattern, e.g. `/Date(1198908717056)/` or
/// `/Date(1198908717056-0700)/`. The timezone suffix is ignored; the
/// millisecond count is already UTC-based.
fn parse_asp_date(s: &str) -> Option<i64> {
    let inner = s.strip_prefix('/').unwrap_or(s).strip_prefix("Date(")?;
    let bytes = inner.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    inner[..end].parse::<i64>().ok()
}

/// Renders a date value in the ASP.NET wire format.
pub fn to_asp_date(date: DateTime<Utc>) -> String {
    format!("/Date({})/", date.timestamp_millis())
}
