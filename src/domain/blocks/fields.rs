//! Field value rules.
//!
//! Block data is stored schema-less (`serde_json::Map`). Reading goes through
//! [`current_value`], which resolves `data[field] ?? default` and coerces it
//! into a [`FieldValue`] according to the field kind. Writing goes through
//! [`serialize_edit`], which turns editor input into the canonical stored
//! representation. Applying `serialize_edit` to a `current_value` of canonical
//! data yields the same bytes, so re-saving an untouched field is a no-op.
//!
//! Nothing here escapes HTML. Values are stored raw and escaped by the
//! templates that interpolate them.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::document::BlockInstance;
use super::registry::{BlockTypeDefinition, FieldKind, FieldSchema};

// Integers beyond this lose precision as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("`{value}` is not one of the allowed options")]
    InvalidOption { value: String },
    #[error("`{value}` is not a number")]
    NotNumeric { value: String },
    #[error("field `{field}` is not defined for this block type")]
    UnknownField { field: String },
}

/// Typed view of a stored field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Choice(String),
}

impl FieldValue {
    /// The value as the editor would submit it.
    pub fn to_raw(&self) -> Value {
        match self {
            FieldValue::Text(text) | FieldValue::Choice(text) => Value::String(text.clone()),
            FieldValue::Number(number) => canonical_number(*number).unwrap_or(Value::Null),
            FieldValue::Bool(flag) => Value::Bool(*flag),
        }
    }

    /// Plain-text rendering used by previews and input `value` attributes.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(text) | FieldValue::Choice(text) => text.clone(),
            FieldValue::Number(number) => format_number(*number),
            FieldValue::Bool(flag) => flag.to_string(),
        }
    }
}

/// Resolve and coerce the value of `field` on `instance`.
pub fn current_value(
    definition: &BlockTypeDefinition,
    field: &str,
    instance: &BlockInstance,
) -> Result<FieldValue, FieldError> {
    let schema = definition
        .field(field)
        .ok_or_else(|| FieldError::UnknownField {
            field: field.to_string(),
        })?;
    Ok(resolve(
        schema,
        instance.data.get(field),
        definition.defaults.get(field),
    ))
}

/// Coerce a stored value, falling back to the default and then to the kind's zero value.
pub fn resolve(
    schema: &FieldSchema,
    stored: Option<&Value>,
    default: Option<&Value>,
) -> FieldValue {
    let raw = stored.filter(|value| !value.is_null()).or(default);

    match schema.kind {
        FieldKind::Text | FieldKind::Textarea | FieldKind::Richtext => {
            FieldValue::Text(raw.map(text_of).unwrap_or_default())
        }
        FieldKind::Number | FieldKind::Range => {
            let number = raw
                .and_then(number_of)
                .or_else(|| default.and_then(number_of))
                .or(schema.constraints.min)
                .unwrap_or(0.0);
            FieldValue::Number(schema.constraints.clamp(number))
        }
        FieldKind::Checkbox => FieldValue::Bool(raw.is_some_and(truthy)),
        FieldKind::Select => {
            let options = &schema.constraints.options;
            let choice = raw
                .map(text_of)
                .filter(|value| options.contains_key(value))
                .or_else(|| {
                    default
                        .map(text_of)
                        .filter(|value| options.contains_key(value))
                })
                .or_else(|| options.keys().next().cloned())
                .unwrap_or_default();
            FieldValue::Choice(choice)
        }
    }
}

/// Convert editor input into the stored representation for `schema`.
///
/// Numbers are clamped into `[min, max]` instead of rejected. Select values
/// must be one of the declared options.
pub fn serialize_edit(schema: &FieldSchema, raw: &Value) -> Result<Value, FieldError> {
    match schema.kind {
        FieldKind::Text | FieldKind::Textarea | FieldKind::Richtext => {
            Ok(Value::String(text_of(raw)))
        }
        FieldKind::Number | FieldKind::Range => {
            let number = number_of(raw).ok_or_else(|| FieldError::NotNumeric {
                value: text_of(raw),
            })?;
            canonical_number(schema.constraints.clamp(number)).ok_or_else(|| {
                FieldError::NotNumeric {
                    value: text_of(raw),
                }
            })
        }
        FieldKind::Checkbox => Ok(Value::Bool(truthy(raw))),
        FieldKind::Select => {
            let value = text_of(raw);
            if schema.constraints.options.contains_key(&value) {
                Ok(Value::String(value))
            } else {
                Err(FieldError::InvalidOption { value })
            }
        }
    }
}

/// Normalise every field present in `data`. Fields the definition does not
/// declare are rejected.
pub fn serialize_data(
    definition: &BlockTypeDefinition,
    data: &Map<String, Value>,
) -> Result<Map<String, Value>, (String, FieldError)> {
    let mut normalised = Map::new();
    for (name, raw) in data {
        let schema = definition.field(name).ok_or_else(|| {
            (
                name.clone(),
                FieldError::UnknownField {
                    field: name.clone(),
                },
            )
        })?;
        let value = serialize_edit(schema, raw).map_err(|err| (name.clone(), err))?;
        normalised.insert(name.clone(), value);
    }
    Ok(normalised)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

/// Whole numbers are stored as JSON integers, everything else as floats.
fn canonical_number(number: f64) -> Option<Value> {
    if !number.is_finite() {
        return None;
    }
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(number as i64));
    }
    Number::from_f64(number).map(Value::Number)
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        (number as i64).to_string()
    } else {
        number.to_string()
    }
}
