use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::query::{filter_from_value, sort_from_value};
use crate::utils::json::json_to_bson;
use serde_json::{Map, Value};

use super::types::{Accumulator, Expr, Pipeline, PipelineStage, ProjectItem};

fn query_err(msg: impl Into<String>) -> DbError {
    DbError::QueryError(msg.into())
}

/// Parse the shell form: `[{"$group": {...}}, {"$sort": {...}}, {"$limit": 1}]`.
///
/// # Errors
/// Returns `QueryError` for unknown stages, operators or malformed arguments.
pub fn parse_pipeline_json(json: &str) -> Result<Pipeline, DbError> {
    let v: Value = serde_json::from_str(json)?;
    Pipeline::from_json(&v)
}

impl Pipeline {
    /// # Errors
    /// See [`parse_pipeline_json`].
    pub fn from_json(v: &Value) -> Result<Self, DbError> {
        let items = v.as_array().ok_or_else(|| query_err("pipeline must be a JSON array"))?;
        items.iter().map(stage_from_value).collect::<Result<Vec<_>, _>>().map(Self::new)
    }
}

fn single_key(v: &Value, what: &str) -> Result<(String, Value), DbError> {
    let obj = v.as_object().ok_or_else(|| query_err(format!("{what} must be an object")))?;
    let mut it = obj.iter();
    match (it.next(), it.next()) {
        (Some((k, v)), None) => Ok((k.clone(), v.clone())),
        _ => Err(query_err(format!("{what} must have exactly one key"))),
    }
}

fn count_arg(v: &Value, stage: &str) -> Result<usize, DbError> {
    v.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| query_err(format!("{stage} expects a non-negative integer")))
}

fn stage_from_value(v: &Value) -> Result<PipelineStage, DbError> {
    let (name, arg) = single_key(v, "pipeline stage")?;
    match name.as_str() {
        "$match" => Ok(PipelineStage::Match(filter_from_value(&arg)?)),
        "$project" => project_from_value(&arg),
        "$group" => group_from_value(&arg),
        "$sort" => {
            let spec = sort_from_value(&arg)?;
            if spec.is_empty() {
                return Err(query_err("$sort needs at least one field"));
            }
            Ok(PipelineStage::Sort(spec))
        }
        "$skip" => Ok(PipelineStage::Skip(count_arg(&arg, "$skip")?)),
        "$limit" => match count_arg(&arg, "$limit")? {
            0 => Err(query_err("$limit must be positive")),
            n => Ok(PipelineStage::Limit(n)),
        },
        other => Err(query_err(format!("unsupported pipeline stage {other}"))),
    }
}

fn project_from_value(v: &Value) -> Result<PipelineStage, DbError> {
    let obj = v.as_object().ok_or_else(|| query_err("$project expects an object"))?;
    if obj.is_empty() {
        return Err(query_err("$project needs at least one field"));
    }
    let mut items = Vec::with_capacity(obj.len());
    for (field, spec) in obj {
        let item = match spec {
            Value::Bool(true) => ProjectItem::Include,
            Value::Bool(false) => ProjectItem::Exclude,
            Value::Number(n) => {
                if n.as_f64().is_some_and(|f| f != 0.0) {
                    ProjectItem::Include
                } else {
                    ProjectItem::Exclude
                }
            }
            other => ProjectItem::Computed(expr_from_value(other)?),
        };
        items.push((field.clone(), item));
    }
    let non_id = || items.iter().filter(|(f, _)| f != ID_FIELD);
    let excludes = non_id().any(|(_, i)| matches!(i, ProjectItem::Exclude));
    let others = non_id().any(|(_, i)| !matches!(i, ProjectItem::Exclude));
    if excludes && others {
        return Err(query_err("$project cannot mix exclusion with inclusion or expressions"));
    }
    Ok(PipelineStage::Project(items))
}

fn group_from_value(v: &Value) -> Result<PipelineStage, DbError> {
    let obj = v.as_object().ok_or_else(|| query_err("$group expects an object"))?;
    let id_spec = obj.get(ID_FIELD).ok_or_else(|| query_err("$group requires an _id"))?;
    let id = expr_from_value(id_spec)?;
    let mut fields = Vec::new();
    for (name, spec) in obj {
        if name == ID_FIELD {
            continue;
        }
        let (op, arg) = single_key(spec, &format!("accumulator {name}"))?;
        let acc = match op.as_str() {
            "$sum" => Accumulator::Sum(expr_from_value(&arg)?),
            "$avg" => Accumulator::Avg(expr_from_value(&arg)?),
            "$min" => Accumulator::Min(expr_from_value(&arg)?),
            "$max" => Accumulator::Max(expr_from_value(&arg)?),
            "$count" => Accumulator::Count,
            other => return Err(query_err(format!("unsupported accumulator {other}"))),
        };
        fields.push((name.clone(), acc));
    }
    Ok(PipelineStage::Group { id, fields })
}

fn expr_list(v: &Value, op: &str) -> Result<Vec<Expr>, DbError> {
    let items = v.as_array().ok_or_else(|| query_err(format!("{op} expects an array")))?;
    items.iter().map(expr_from_value).collect()
}

/// Operators that take a single operand accept it bare or wrapped in a one-element array.
fn unary(v: &Value, op: &str) -> Result<Box<Expr>, DbError> {
    match v {
        Value::Array(items) if items.len() == 1 => Ok(Box::new(expr_from_value(&items[0])?)),
        Value::Array(_) => Err(query_err(format!("{op} takes exactly one argument"))),
        other => Ok(Box::new(expr_from_value(other)?)),
    }
}

fn operator_expr(op: &str, arg: &Value) -> Result<Expr, DbError> {
    match op {
        "$literal" => Ok(Expr::Literal(json_to_bson(arg))),
        "$divide" => match expr_list(arg, op)?.as_slice() {
            [a, b] => Ok(Expr::Divide(Box::new(a.clone()), Box::new(b.clone()))),
            _ => Err(query_err("$divide takes exactly two arguments")),
        },
        "$multiply" => Ok(Expr::Multiply(expr_list(arg, op)?)),
        "$concat" => Ok(Expr::Concat(expr_list(arg, op)?)),
        "$floor" => Ok(Expr::Floor(unary(arg, op)?)),
        "$toString" => Ok(Expr::ToString(unary(arg, op)?)),
        other => Err(query_err(format!("unsupported expression operator {other}"))),
    }
}

fn object_expr(obj: &Map<String, Value>) -> Result<Expr, DbError> {
    let mut it = obj.iter();
    if let (Some((k, arg)), None) = (it.next(), it.next())
        && k.starts_with('$')
    {
        return operator_expr(k, arg);
    }
    let mut fields = Vec::with_capacity(obj.len());
    for (k, v) in obj {
        if k.starts_with('$') {
            return Err(query_err(format!("operator {k} must be the only key of its object")));
        }
        fields.push((k.clone(), expr_from_value(v)?));
    }
    Ok(Expr::Object(fields))
}

/// `"$path"` is a field reference; objects with one `$`-key are operators; anything else is
/// a literal.
///
/// # Errors
/// Returns `QueryError` for unknown operators or bad operands.
pub fn expr_from_value(v: &Value) -> Result<Expr, DbError> {
    match v {
        Value::String(s) if s.starts_with("$$") => {
            Err(query_err(format!("variables are not supported: {s}")))
        }
        Value::String(s) if s.starts_with('$') => {
            let path = &s[1..];
            if path.is_empty() {
                return Err(query_err("empty field reference"));
            }
            Ok(Expr::Field(path.to_string()))
        }
        Value::Object(obj) => object_expr(obj),
        other => Ok(Expr::Literal(json_to_bson(other))),
    }
}
