//! Backend-native results to JSON.

use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, ValueRef};

use crate::{ResultSet, Row};

/// Decode one MySQL row into an ordered JSON object.
pub fn mysql_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), mysql_value(row, column.ordinal())))
        .collect()
}

fn mysql_value(row: &MySqlRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }
    // Checked decodes first, from the most to the least specific type; the
    // unchecked text decode picks up DECIMAL and friends.
    row.try_get::<i64, _>(idx)
        .map(Value::from)
        .or_else(|_| row.try_get::<u64, _>(idx).map(Value::from))
        .or_else(|_| row.try_get::<f64, _>(idx).map(Value::from))
        .or_else(|_| row.try_get::<String, _>(idx).map(Value::from))
        .or_else(|_| {
            row.try_get::<NaiveDateTime, _>(idx)
                .map(|v| Value::from(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        })
        .or_else(|_| {
            row.try_get::<DateTime<Utc>, _>(idx)
                .map(|v| Value::from(v.to_rfc3339()))
        })
        .or_else(|_| {
            row.try_get::<NaiveDate, _>(idx)
                .map(|v| Value::from(v.format("%Y-%m-%d").to_string()))
        })
        .or_else(|_| {
            row.try_get::<NaiveTime, _>(idx)
                .map(|v| Value::from(v.format("%H:%M:%S%.f").to_string()))
        })
        .or_else(|_| row.try_get::<Value, _>(idx))
        .or_else(|_| row.try_get_unchecked::<String, _>(idx).map(Value::from))
        .or_else(|_| {
            row.try_get_unchecked::<Vec<u8>, _>(idx)
                .map(|bytes| Value::from(String::from_utf8_lossy(&bytes).into_owned()))
        })
        .unwrap_or(Value::Null)
}

/// Unwrap single-column rows (`SHOW TABLES`, `SHOW DATABASES`) to their scalar.
pub fn first_column(rows: ResultSet) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.into_iter().next().map(|(_, value)| value))
        .map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

/// Recursive BSON to JSON. ObjectIds become their hex string wherever they
/// appear, so the result is always plain JSON.
pub fn bson_value(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Value::from(f),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_value).collect()),
        Bson::Document(doc) => Value::Object(document(doc)),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::Decimal128(d) => match Bson::Decimal128(d).into_relaxed_extjson() {
            Value::Object(mut wrapped) => wrapped.remove("$numberDecimal").unwrap_or(Value::Null),
            other => other,
        },
        other => other.into_relaxed_extjson(),
    }
}

pub fn document(doc: Document) -> Row {
    doc.into_iter()
        .map(|(key, value)| (key, bson_value(value)))
        .collect()
}

pub fn documents(docs: Vec<Document>) -> ResultSet {
    docs.into_iter().map(document).collect()
}
