//! Document-store query construction.
//!
//! Request JSON is converted to BSON structurally: `$`-prefixed keys are
//! kept as plain keys and never read as extended JSON. The only rewrite is
//! the opportunistic `_id` coercion applied to filters.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{TranslateError, TranslateResult};

pub const DEFAULT_READ_LIMIT: i64 = 10;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRead {
    Find { filter: Document, limit: i64 },
    Aggregate { pipeline: Vec<Document> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    Insert {
        document: Document,
    },
    Update {
        filter: Document,
        update: Document,
        multiple: bool,
    },
    Delete {
        filter: Document,
        multiple: bool,
    },
}

/// Structural JSON object to BSON document conversion.
///
/// Single-key maps such as `{"$oid": ...}` or `{"$numberLong": ...}` stay
/// plain sub-documents.
pub fn to_document(map: &Map<String, Value>) -> TranslateResult<Document> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), to_bson(value)?)))
        .collect()
}

fn to_bson(value: &Value) -> TranslateResult<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Bson::Double(f)
            } else {
                return Err(TranslateError::InvalidDocument(format!(
                    "number {n} is out of range"
                )));
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => {
            Bson::Array(items.iter().map(to_bson).collect::<TranslateResult<_>>()?)
        }
        Value::Object(map) => Bson::Document(to_document(map)?),
    })
}

/// Convert a filter and coerce `_id` strings to ObjectIds where they parse.
pub fn filter(map: &Map<String, Value>) -> TranslateResult<Document> {
    let mut doc = to_document(map)?;
    coerce_identifiers(&mut doc);
    Ok(doc)
}

/// Rewrite every `_id` key whose value is a valid ObjectId hex string, at any
/// depth (so `$or: [{_id: ...}]` works too). Strings that do not parse are
/// left alone and matched literally.
pub fn coerce_identifiers(doc: &mut Document) {
    for (key, value) in doc.iter_mut() {
        if key == ID_FIELD {
            let parsed = match value {
                Bson::String(raw) => match ObjectId::parse_str(raw.as_str()) {
                    Ok(oid) => Some(oid),
                    Err(_) => {
                        debug!(value = %raw, "_id is not an ObjectId, matching it as a string");
                        None
                    }
                },
                _ => None,
            };
            if let Some(oid) = parsed {
                *value = Bson::ObjectId(oid);
                continue;
            }
        }
        coerce_nested(value);
    }
}

fn coerce_nested(value: &mut Bson) {
    match value {
        Bson::Document(doc) => coerce_identifiers(doc),
        Bson::Array(items) => items.iter_mut().for_each(coerce_nested),
        _ => {}
    }
}

pub fn find(map: &Map<String, Value>, limit: i64) -> TranslateResult<DocumentRead> {
    Ok(DocumentRead::Find {
        filter: filter(map)?,
        limit,
    })
}

pub fn aggregate(stages: &[Value]) -> TranslateResult<DocumentRead> {
    if stages.is_empty() {
        return Err(TranslateError::Empty("pipeline"));
    }
    let pipeline = stages
        .iter()
        .map(|stage| match stage {
            Value::Object(map) => to_document(map),
            other => Err(TranslateError::InvalidDocument(format!(
                "pipeline stage must be an object, got {}",
                other
            ))),
        })
        .collect::<TranslateResult<Vec<_>>>()?;
    Ok(DocumentRead::Aggregate { pipeline })
}

pub fn insert(document: &Map<String, Value>) -> TranslateResult<DocumentWrite> {
    if document.is_empty() {
        return Err(TranslateError::Empty("document"));
    }
    Ok(DocumentWrite::Insert {
        document: to_document(document)?,
    })
}

pub fn update(
    filter_map: &Map<String, Value>,
    update: &Map<String, Value>,
    multiple: bool,
) -> TranslateResult<DocumentWrite> {
    if filter_map.is_empty() {
        return Err(TranslateError::Empty("filter"));
    }
    if update.is_empty() {
        return Err(TranslateError::Empty("update"));
    }
    Ok(DocumentWrite::Update {
        filter: filter(filter_map)?,
        update: to_document(update)?,
        multiple,
    })
}

pub fn delete(filter_map: &Map<String, Value>, multiple: bool) -> TranslateResult<DocumentWrite> {
    if filter_map.is_empty() {
        return Err(TranslateError::Empty("filter"));
    }
    Ok(DocumentWrite::Delete {
        filter: filter(filter_map)?,
        multiple,
    })
}
