//! Canonical text conversion for primitive values.
//!
//! The codec never interprets primitive text itself; it goes through these
//! two functions. The textual form is canonical and minimal: `5`, `true`,
//! `3.5`, strings verbatim, and the literal `null` sentinel for an absent
//! value. Parsing is driven by the field's declared type, which the stream
//! does not repeat.

use crate::class::PrimitiveType;
use crate::error::{ModelError, Result};
use crate::value::Value;

/// Render a primitive value as its canonical text.
///
/// References have no textual form and are rejected; the codec writes them
/// as named `<reference>` elements instead.
pub fn value_to_string(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Str(s) => Ok(s.clone()),
        Value::Ref(_) => Err(ModelError::NotPrimitive),
    }
}

/// Parse canonical text back into a typed value.
///
/// The literal `null` parses to [`Value::Null`] for every type.
pub fn value_from_string(ty: PrimitiveType, text: &str) -> Result<Value> {
    if text == "null" {
        return Ok(Value::Null);
    }
    let invalid = || ModelError::InvalidValue {
        ty,
        text: text.to_string(),
    };
    match ty {
        PrimitiveType::Bool => text.parse().map(Value::Bool).map_err(|_| invalid()),
        PrimitiveType::Int => text.parse().map(Value::Int).map_err(|_| invalid()),
        PrimitiveType::Float => text.parse().map(Value::Float).map_err(|_| invalid()),
        PrimitiveType::Str => Ok(Value::Str(text.to_string())),
    }
}
