//! Shell-style JSON grammars: `{"genre": "Fiction", "published_year": {"$gt": 2000}}` filters,
//! `{"$set": {...}}` updates, `{"_id": 0, "title": 1}` projections and `{"price": -1}` sorts.

use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::utils::json::json_to_bson;
use crate::utils::num::bson_as_f64;
use bson::Bson;
use serde_json::{Map, Value};

use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, Order, Projection,
    SortSpec, UpdateDoc,
};

const MAX_UPDATE_FIELDS: usize = 128;

fn query_err(msg: impl Into<String>) -> DbError {
    DbError::QueryError(msg.into())
}

fn as_object<'a>(v: &'a Value, what: &str) -> Result<&'a Map<String, Value>, DbError> {
    v.as_object().ok_or_else(|| query_err(format!("{what} must be a JSON object")))
}

/// # Errors
/// Returns an error for invalid JSON, unknown operators or malformed operands.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let v: Value = serde_json::from_str(json)?;
    filter_from_value(&v)
}

/// Build a filter from an already-parsed JSON object. Sibling keys are ANDed.
///
/// # Errors
/// See [`parse_filter_json`].
pub fn filter_from_value(v: &Value) -> Result<Filter, DbError> {
    let obj = as_object(v, "filter")?;
    let mut parts = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        match key.as_str() {
            "$and" => parts.push(Filter::And(filter_list(val, "$and")?)),
            "$or" => parts.push(Filter::Or(filter_list(val, "$or")?)),
            "$nor" => parts.push(Filter::Not(Box::new(Filter::Or(filter_list(val, "$nor")?)))),
            op if op.starts_with('$') => return Err(query_err(format!("unknown top-level operator {op}"))),
            field => parts.push(field_predicate(field, val)?),
        }
    }
    Ok(Filter::all(parts))
}

fn filter_list(v: &Value, op: &str) -> Result<Vec<Filter>, DbError> {
    let items = v.as_array().ok_or_else(|| query_err(format!("{op} expects an array")))?;
    if items.is_empty() {
        return Err(query_err(format!("{op} expects a non-empty array")));
    }
    items.iter().map(filter_from_value).collect()
}

fn is_operator_object(v: &Value) -> bool {
    v.as_object().is_some_and(|o| o.keys().next().is_some_and(|k| k.starts_with('$')))
}

fn value_list(v: &Value, op: &str) -> Result<Vec<Bson>, DbError> {
    let items = v.as_array().ok_or_else(|| query_err(format!("{op} expects an array")))?;
    if items.len() > MAX_IN_SET {
        return Err(query_err(format!("{op} accepts at most {MAX_IN_SET} values")));
    }
    Ok(items.iter().map(json_to_bson).collect())
}

fn field_predicate(field: &str, v: &Value) -> Result<Filter, DbError> {
    if !is_operator_object(v) {
        return Ok(Filter::eq(field, json_to_bson(v)));
    }
    let ops = as_object(v, field)?;
    let mut parts = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        let cmp = |op: CmpOp| Filter::Cmp { path: field.to_string(), op, value: json_to_bson(arg) };
        parts.push(match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => Filter::Not(Box::new(cmp(CmpOp::Eq))),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" => Filter::In { path: field.to_string(), values: value_list(arg, "$in")? },
            "$nin" => Filter::Nin { path: field.to_string(), values: value_list(arg, "$nin")? },
            "$exists" => Filter::Exists {
                path: field.to_string(),
                exists: arg.as_bool().or_else(|| arg.as_f64().map(|n| n != 0.0)).ok_or_else(|| {
                    query_err("$exists expects a boolean")
                })?,
            },
            "$not" => {
                if !is_operator_object(arg) {
                    return Err(query_err("$not expects an operator object"));
                }
                Filter::Not(Box::new(field_predicate(field, arg)?))
            }
            other if other.starts_with('$') => {
                return Err(query_err(format!("unknown operator {other} on {field}")));
            }
            other => return Err(query_err(format!("cannot mix operators and field {other} under {field}"))),
        });
    }
    Ok(Filter::all(parts))
}

/// Parse `{"$set": {...}, "$inc": {...}, "$unset": {...}}`. Replacement documents are refused.
///
/// # Errors
/// Returns `QueryError` for missing or unknown operators, `_id` targets, or a non-numeric `$inc`.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, DbError> {
    let v: Value = serde_json::from_str(json)?;
    let obj = as_object(&v, "update")?;
    let mut out = UpdateDoc::default();
    for (op, arg) in obj {
        match op.as_str() {
            "$set" => {
                for (k, v) in as_object(arg, "$set")?.iter().take(MAX_UPDATE_FIELDS) {
                    out.set.push((k.clone(), json_to_bson(v)));
                }
            }
            "$inc" => {
                for (k, v) in as_object(arg, "$inc")?.iter().take(MAX_UPDATE_FIELDS) {
                    let by = bson_as_f64(&json_to_bson(v))
                        .ok_or_else(|| query_err(format!("$inc on {k} requires a number")))?;
                    out.inc.push((k.clone(), by));
                }
            }
            "$unset" => match arg {
                Value::Object(fields) => out.unset.extend(fields.keys().take(MAX_UPDATE_FIELDS).cloned()),
                Value::Array(fields) => {
                    for f in fields.iter().take(MAX_UPDATE_FIELDS) {
                        let name = f.as_str().ok_or_else(|| query_err("$unset list must hold field names"))?;
                        out.unset.push(name.to_string());
                    }
                }
                _ => return Err(query_err("$unset expects an object or array")),
            },
            other if other.starts_with('$') => return Err(query_err(format!("unknown update operator {other}"))),
            _ => return Err(query_err("update must use operators such as $set")),
        }
    }
    if out.is_empty() {
        return Err(query_err("update has no operators"));
    }
    let touches_id = out
        .set
        .iter()
        .map(|(k, _)| k)
        .chain(out.inc.iter().map(|(k, _)| k))
        .chain(out.unset.iter())
        .any(|k| k == ID_FIELD);
    if touches_id {
        return Err(query_err("_id cannot be modified"));
    }
    Ok(out)
}

fn flag(v: &Value, field: &str) -> Result<bool, DbError> {
    v.as_bool()
        .or_else(|| v.as_f64().map(|n| n != 0.0))
        .ok_or_else(|| query_err(format!("projection flag for {field} must be 0/1 or a boolean")))
}

/// Parse `{"_id": 0, "title": 1}`. `{}` means no projection.
///
/// # Errors
/// Returns `QueryError` when inclusion and exclusion are mixed on non-`_id` fields.
pub fn parse_projection_json(json: &str) -> Result<Option<Projection>, DbError> {
    let v: Value = serde_json::from_str(json)?;
    let obj = as_object(&v, "projection")?;
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for (field, val) in obj.iter().take(MAX_PROJECTION_FIELDS) {
        let on = flag(val, field)?;
        if field == ID_FIELD {
            include_id = on;
        } else if on {
            included.push(field.clone());
        } else {
            excluded.push(field.clone());
        }
    }
    match (included.is_empty(), excluded.is_empty()) {
        (false, false) => Err(query_err("projection cannot mix inclusion and exclusion")),
        (false, true) => Ok(Some(Projection::Include { fields: included, include_id })),
        (true, false) => {
            let p = Projection::Exclude(excluded);
            Ok(Some(if include_id { p } else { p.without_id() }))
        }
        (true, true) if !include_id => Ok(Some(Projection::Exclude(vec![ID_FIELD.to_string()]))),
        (true, true) => Ok(None),
    }
}

/// Parse `{"price": -1, "title": 1}`; key order is the sort priority.
///
/// # Errors
/// Returns `QueryError` for directions other than `1`/`-1`.
pub fn parse_sort_json(json: &str) -> Result<Vec<SortSpec>, DbError> {
    let v: Value = serde_json::from_str(json)?;
    sort_from_value(&v)
}

/// # Errors
/// See [`parse_sort_json`].
pub fn sort_from_value(v: &Value) -> Result<Vec<SortSpec>, DbError> {
    let obj = as_object(v, "sort")?;
    if obj.len() > MAX_SORT_FIELDS {
        return Err(query_err(format!("sort accepts at most {MAX_SORT_FIELDS} fields")));
    }
    obj.iter()
        .map(|(field, dir)| {
            let d = dir
                .as_i64()
                .ok_or_else(|| query_err(format!("sort direction for {field} must be 1 or -1")))?;
            Ok(SortSpec { field: field.clone(), order: Order::from_direction(d)? })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_keys_form_a_conjunction() {
        let f = parse_filter_json(r#"{"in_stock": true, "published_year": {"$gt": 2010}}"#).unwrap();
        assert_eq!(f, Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", 2010)]));
    }

    #[test]
    fn single_equality_is_not_wrapped() {
        assert_eq!(parse_filter_json(r#"{"genre": "Fiction"}"#).unwrap(), Filter::eq("genre", "Fiction"));
        assert_eq!(parse_filter_json("{}").unwrap(), Filter::True);
    }

    #[test]
    fn ne_and_not_negate() {
        let f = parse_filter_json(r#"{"genre": {"$ne": "Fantasy"}}"#).unwrap();
        assert_eq!(f, Filter::Not(Box::new(Filter::eq("genre", "Fantasy"))));
        let f = parse_filter_json(r#"{"price": {"$not": {"$gt": 10}}}"#).unwrap();
        assert_eq!(f, Filter::Not(Box::new(Filter::gt("price", 10))));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        assert!(parse_filter_json(r#"{"price": {"$between": [1, 2]}}"#).is_err());
        assert!(parse_filter_json(r#"{"$or": []}"#).is_err());
        assert!(parse_filter_json(r#"{"$where": "x"}"#).is_err());
        assert!(parse_filter_json(r#"["genre"]"#).is_err());
        assert!(parse_filter_json(r#"{"price": {"$gt": 1, "x": 2}}"#).is_err());
    }

    #[test]
    fn or_and_in_parse() {
        let f = parse_filter_json(r#"{"$or": [{"author": "A"}, {"genre": {"$in": ["X", "Y"]}}]}"#).unwrap();
        let Filter::Or(members) = f else { panic!("expected $or") };
        assert_eq!(members.len(), 2);
        assert!(matches!(&members[1], Filter::In { values, .. } if values.len() == 2));
    }

    #[test]
    fn update_requires_operators() {
        assert!(parse_update_json(r#"{"price": 5}"#).is_err());
        assert!(parse_update_json(r#"{"$rename": {"a": "b"}}"#).is_err());
        assert!(parse_update_json(r#"{"$set": {"_id": "x"}}"#).is_err());
        assert!(parse_update_json(r#"{"$inc": {"price": "1"}}"#).is_err());
        assert!(parse_update_json("{}").is_err());
    }

    #[test]
    fn update_collects_each_operator() {
        let u = parse_update_json(r#"{"$set": {"price": 12.5}, "$inc": {"pages": 1}, "$unset": {"publisher": ""}}"#)
            .unwrap();
        assert_eq!(u.set, vec![("price".to_string(), Bson::Double(12.5))]);
        assert_eq!(u.inc, vec![("pages".to_string(), 1.0)]);
        assert_eq!(u.unset, vec!["publisher".to_string()]);
    }

    #[test]
    fn projection_forms() {
        let p = parse_projection_json(r#"{"_id": 0, "title": 1, "author": 1, "price": 1}"#).unwrap();
        assert_eq!(
            p,
            Some(Projection::Include {
                fields: vec!["title".into(), "author".into(), "price".into()],
                include_id: false
            })
        );
        assert_eq!(parse_projection_json("{}").unwrap(), None);
        assert_eq!(
            parse_projection_json(r#"{"_id": 0}"#).unwrap(),
            Some(Projection::Exclude(vec!["_id".into()]))
        );
        assert!(parse_projection_json(r#"{"title": 1, "price": 0}"#).is_err());
    }

    #[test]
    fn sort_keeps_key_order() {
        let s = parse_sort_json(r#"{"price": -1, "title": 1}"#).unwrap();
        assert_eq!(s, vec![SortSpec::desc("price"), SortSpec::asc("title")]);
        assert!(parse_sort_json(r#"{"price": 0}"#).is_err());
    }
}
