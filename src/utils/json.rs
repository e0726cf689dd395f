//! Conversion between `serde_json::Value` and BSON, as used by the JSON query grammars,
//! the import path and the WAL body encoding.

use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use serde_json::{Map, Number, Value};

/// Convert a JSON value into BSON. Integers take the narrowest integral type, other numbers
/// become doubles.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn json_to_bson(val: &Value) -> Bson {
    match val {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                crate::utils::num::int_to_bson(i)
            } else if let Some(u) = n.as_u64() {
                Bson::Double(u as f64)
            } else {
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(obj) => Bson::Document(json_object_to_bson(obj)),
    }
}

fn json_object_to_bson(obj: &Map<String, Value>) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (k, v) in obj {
        out.insert(k.clone(), json_to_bson(v));
    }
    out
}

/// Convert a serde_json::Value that must be an object into a bson::Document.
///
/// # Errors
/// Returns `QueryError` when the value is not an object.
pub fn json_value_to_bson_document(val: &Value) -> Result<BsonDocument, DbError> {
    val.as_object()
        .map(json_object_to_bson)
        .ok_or_else(|| DbError::QueryError("expected JSON object".into()))
}

/// Parse a JSON string into a bson::Document. The JSON must be a top-level object.
///
/// # Errors
/// Returns an error when the input is not valid JSON or not an object.
pub fn parse_json_to_bson_document(json: &str) -> Result<BsonDocument, DbError> {
    let val: Value = serde_json::from_str(json)?;
    json_value_to_bson_document(&val)
}

/// Convert BSON into plain (relaxed) JSON for output and WAL bodies.
#[must_use]
pub fn bson_to_json(val: &Bson) -> Value {
    match val {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Number(Number::from(*i)),
        Bson::Int64(i) => Value::Number(Number::from(*i)),
        Bson::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(d) => bson_document_to_json(d),
        other => Value::String(other.to_string()),
    }
}

#[must_use]
pub fn bson_document_to_json(doc: &BsonDocument) -> Value {
    let mut obj = Map::new();
    for (k, v) in doc {
        obj.insert(k.clone(), bson_to_json(v));
    }
    Value::Object(obj)
}
