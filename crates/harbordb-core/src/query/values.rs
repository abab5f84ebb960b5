//! Result cell decoding.
//!
//! Cells decode natively per wire type — numbers as numbers, temporals via
//! chrono — never through locale-dependent text formatting. Types the driver
//! cannot decode fall back to their text rendering (the builder already casts
//! those to text in the select list).

use log::debug;
use serde_json::{Number, Value as JsonValue};
use tokio_postgres::Row;

/// Decode one cell to JSON, keyed by the wire type's name.
pub fn cell_to_json(row: &Row, idx: usize) -> JsonValue {
    let column_type = row.columns()[idx].type_().clone();

    let decoded = match column_type.name() {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map(JsonValue::Bool)),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(|n| JsonValue::Number(n.into()))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(|n| JsonValue::Number(n.into()))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .map(|v| v.map(|n| JsonValue::Number(n.into()))),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|n| float_to_json(n as f64))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .map(|v| v.map(float_to_json)),
        "text" | "varchar" | "bpchar" | "name" => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map(JsonValue::String)),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .map(|v| v.map(|u| JsonValue::String(u.to_string()))),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| v.map(|dt| JsonValue::String(dt.to_rfc3339()))),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map(|v| v.map(|dt| JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map(|v| v.map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))),
        "json" | "jsonb" => row.try_get::<_, Option<JsonValue>>(idx),
        // Free-form SQL can produce types the builder never emits; try the
        // text rendering before giving up.
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map(JsonValue::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => JsonValue::Null,
        Err(e) => {
            debug!(
                "Undecodable cell at column {} ({}): {}",
                idx, column_type, e
            );
            JsonValue::Null
        }
    }
}

fn float_to_json(value: f64) -> JsonValue {
    // NaN and infinities have no JSON representation.
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_json_handles_non_finite() {
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
        assert_eq!(float_to_json(f64::NAN), JsonValue::Null);
        assert_eq!(float_to_json(f64::INFINITY), JsonValue::Null);
    }
}
