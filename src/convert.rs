//! Type Coercer.
//!
//! Converts decoded JSON values into the canonical `Value` declared by the
//! dictionary for each property. Failures drop only the offending property.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::diagnostic::{DiagnosticKind, PropertyDiagnostic};
use crate::dictionary::{DataType, Dictionary, PropertyDefinition};
use crate::document::json_type_name;
use crate::model::{PropertyMap, QName, Value};

/// A value that does not fit its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub expected: String,
    pub reason: String,
}

impl ConversionError {
    fn new(expected: impl ToString, reason: impl Into<String>) -> Self {
        Self { expected: expected.to_string(), reason: reason.into() }
    }
}

/// Convert every qualified entry. `null` and empty arrays carry no value
/// and are skipped without a diagnostic.
pub fn convert_properties(
    raw: BTreeMap<QName, JsonValue>,
    dictionary: &dyn Dictionary,
    diagnostics: &mut Vec<PropertyDiagnostic>,
) -> PropertyMap {
    let mut converted = PropertyMap::with_capacity(raw.len());
    for (name, json) in raw {
        match convert_value(&json, dictionary.property(&name)) {
            Ok(Some(value)) => {
                converted.insert(name, value);
            }
            Ok(None) => tracing::trace!(property = %name, "no value extracted"),
            Err(e) => {
                tracing::debug!(
                    property = %name, value = %json, expected = %e.expected, reason = %e.reason,
                    "dropping unconvertible property"
                );
                let kind = DiagnosticKind::Unconvertible { expected: e.expected, reason: e.reason };
                diagnostics.push(PropertyDiagnostic::new(name.to_string(), json, kind));
            }
        }
    }
    converted
}

/// Convert one value against an optional definition. Undefined properties
/// keep their natural JSON mapping.
pub fn convert_value(
    json: &JsonValue,
    definition: Option<&PropertyDefinition>,
) -> Result<Option<Value>, ConversionError> {
    let Some(def) = definition else {
        return natural(json);
    };

    match json {
        JsonValue::Array(items) if def.multi_valued => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = convert_scalar(item, def.data_type)? {
                    values.push(v);
                }
            }
            Ok((!values.is_empty()).then_some(Value::List(values)))
        }
        JsonValue::Array(items) => match items.as_slice() {
            [] => Ok(None),
            [single] => convert_scalar(single, def.data_type),
            _ => Err(ConversionError::new(
                def.data_type,
                format!("{} values for a single-valued property", items.len()),
            )),
        },
        scalar if def.multi_valued => {
            Ok(convert_scalar(scalar, def.data_type)?.map(|v| Value::List(vec![v])))
        }
        scalar => convert_scalar(scalar, def.data_type),
    }
}

fn natural(json: &JsonValue) -> Result<Option<Value>, ConversionError> {
    match json {
        JsonValue::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = convert_scalar(item, DataType::Any)? {
                    values.push(v);
                }
            }
            Ok((!values.is_empty()).then_some(Value::List(values)))
        }
        scalar => convert_scalar(scalar, DataType::Any),
    }
}

fn convert_scalar(json: &JsonValue, data_type: DataType) -> Result<Option<Value>, ConversionError> {
    let mismatch = || ConversionError::new(data_type, format!("cannot convert {}", json_type_name(json)));

    let value = match (data_type, json) {
        (_, JsonValue::Null) => return Ok(None),
        (_, JsonValue::Array(_) | JsonValue::Object(_)) => return Err(mismatch()),

        (DataType::Any, JsonValue::Bool(b)) => Value::Bool(*b),
        (DataType::Any, JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(mismatch)?),
        },
        (DataType::Any, JsonValue::String(s)) => Value::String(s.clone()),

        (DataType::Text | DataType::MlText, JsonValue::String(s)) => Value::String(s.clone()),
        (DataType::Text | DataType::MlText, JsonValue::Number(n)) => Value::String(n.to_string()),
        (DataType::Text | DataType::MlText, JsonValue::Bool(b)) => Value::String(b.to_string()),

        (DataType::Int, _) => {
            let i = integer(json, data_type)?;
            i32::try_from(i).map_err(|_| ConversionError::new(data_type, "out of range"))?;
            Value::Int(i)
        }
        (DataType::Long, _) => Value::Int(integer(json, data_type)?),

        (DataType::Float | DataType::Double, _) => {
            let f = float(json, data_type)?;
            if !f.is_finite() || (data_type == DataType::Float && f.abs() > f64::from(f32::MAX)) {
                return Err(ConversionError::new(data_type, "out of range"));
            }
            Value::Float(f)
        }

        (DataType::Boolean, JsonValue::Bool(b)) => Value::Bool(*b),
        (DataType::Boolean, JsonValue::String(s)) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(ConversionError::new(data_type, format!("'{s}' is not true or false")));
            }
        }

        (DataType::Date, JsonValue::String(s)) => Value::Date(
            parse_date(s).ok_or_else(|| ConversionError::new(data_type, format!("unrecognised date '{s}'")))?,
        ),
        (DataType::DateTime, JsonValue::String(s)) => Value::DateTime(
            parse_datetime(s)
                .ok_or_else(|| ConversionError::new(data_type, format!("unrecognised date '{s}'")))?,
        ),
        (DataType::Date, JsonValue::Number(_)) => Value::Date(epoch_millis(json, data_type)?.date_naive()),
        (DataType::DateTime, JsonValue::Number(_)) => Value::DateTime(epoch_millis(json, data_type)?),

        _ => return Err(mismatch()),
    };
    Ok(Some(value))
}

fn integer(json: &JsonValue, data_type: DataType) -> Result<i64, ConversionError> {
    match json {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.2e18).map(|f| f as i64))
            .ok_or_else(|| ConversionError::new(data_type, format!("{n} is not an integer"))),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ConversionError::new(data_type, format!("'{s}': {e}"))),
        other => Err(ConversionError::new(data_type, format!("cannot convert {}", json_type_name(other)))),
    }
}

fn float(json: &JsonValue, data_type: DataType) -> Result<f64, ConversionError> {
    match json {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| ConversionError::new(data_type, format!("{n} is not a number"))),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| ConversionError::new(data_type, format!("'{s}': {e}"))),
        other => Err(ConversionError::new(data_type, format!("cannot convert {}", json_type_name(other)))),
    }
}

fn epoch_millis(json: &JsonValue, data_type: DataType) -> Result<DateTime<Utc>, ConversionError> {
    let millis = json
        .as_i64()
        .ok_or_else(|| ConversionError::new(data_type, "epoch milliseconds must be an integer"))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ConversionError::new(data_type, "timestamp out of range"))
}

/// RFC 3339, naive ISO date-times (taken as UTC), plain dates, RFC 2822.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(s).ok().map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}
