//! Coercion of raw values into the type class of their column.

use sqlrecord_core::{ColumnMeta, TypeClass, Value};

/// Coerce `value` for storage in `column`.
///
/// Null, structured values (JSON, arrays) and values for undeclared columns
/// pass through unchanged, as does anything stored in a column of
/// [`TypeClass::Other`].
pub fn coerce(value: Value, column: Option<&ColumnMeta>) -> Value {
    let Some(column) = column else {
        return value;
    };
    if value.is_null() || value.is_structured() {
        return value;
    }

    match column.class {
        TypeClass::Integer => to_integer(value, column),
        TypeClass::Float => to_float(value, column),
        TypeClass::Bool => Value::Bool(truthy(&value)),
        TypeClass::String => to_text(value),
        TypeClass::Other => value,
    }
}

/// Truthiness of a scalar: `false`, `0`, `0.0`, `""` and `"0"` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(v) => *v != 0,
        Value::Float(v) => *v != 0.0,
        Value::Text(s) => !(s.is_empty() || s == "0"),
        Value::Bytes(b) => !(b.is_empty() || b == b"0"),
        Value::Json(j) => !j.is_null(),
        Value::Array(items) => !items.is_empty(),
    }
}

fn to_integer(value: Value, column: &ColumnMeta) -> Value {
    match value {
        Value::Int(_) => value,
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Float(f) => float_to_integer(f, &column.name),
        Value::Text(s) => text_to_integer(&s, column),
        Value::Bytes(b) => text_to_integer(&String::from_utf8_lossy(&b), column),
        other => other,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_integer(f: f64, column: &str) -> Value {
    if !f.is_finite() {
        return Value::Int(0);
    }
    let truncated = f.trunc();
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Value::Int(truncated as i64)
    } else {
        tracing::warn!(column = column, value = f, "integer out of range, kept as text");
        Value::Text(format!("{truncated:.0}"))
    }
}

fn text_to_integer(text: &str, column: &ColumnMeta) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return if column.nullable {
            Value::Null
        } else {
            Value::Int(0)
        };
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int(v);
    }

    // Whole numbers beyond i64 keep every digit
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        tracing::warn!(
            column = %column.name,
            value = trimmed,
            "integer out of range, kept as text"
        );
        return Value::Text(trimmed.trim_start_matches('+').to_string());
    }

    match trimmed.parse::<f64>() {
        Ok(f) => float_to_integer(f, &column.name),
        Err(_) => Value::Int(leading_integer(trimmed)),
    }
}

/// The integer formed by the leading digits of `text`, or 0.
fn leading_integer(text: &str) -> i64 {
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse::<i64>().map_or(0, |v| sign * v)
}

fn to_float(value: Value, column: &ColumnMeta) -> Value {
    match value {
        Value::Float(_) => value,
        Value::Int(v) => Value::Float(v as f64),
        Value::Bool(b) => Value::Float(if b { 1.0 } else { 0.0 }),
        Value::Text(s) => text_to_float(&s, column),
        Value::Bytes(b) => text_to_float(&String::from_utf8_lossy(&b), column),
        other => other,
    }
}

fn text_to_float(text: &str, column: &ColumnMeta) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return if column.nullable {
            Value::Null
        } else {
            Value::Float(0.0)
        };
    }
    Value::Float(trimmed.parse::<f64>().unwrap_or(0.0))
}

fn to_text(value: Value) -> Value {
    match value {
        Value::Text(_) => value,
        Value::Bytes(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
        other => Value::Text(other.to_string()),
    }
}
