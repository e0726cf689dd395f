use crate::collection::Collection;
use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::utils::devlog;
use crate::query::{FindOptions, compare_bson, compare_docs, eval_filter, get_path, values_equal};
use crate::utils::num::{bson_as_f64, bson_as_i64, int_to_bson, u128_to_u64_saturating, usize_to_u64};
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::time::Instant;

use super::expr::eval_expr;
use super::types::{Accumulator, Expr, Pipeline, PipelineStage, ProjectItem};

/// Run `pipeline` over the collection. A leading `$match` is answered through the query
/// planner so it can use an index; every later stage works on the document stream in order.
///
/// # Errors
/// Returns `QueryError` when an expression fails on some document.
pub fn run_pipeline(col: &Collection, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
    let start = Instant::now();
    let (mut docs, rest) = match pipeline.stages.split_first() {
        Some((PipelineStage::Match(filter), rest)) => {
            let (docs, _) = crate::query::execute_find(col, filter, &FindOptions::default());
            (docs, rest)
        }
        _ => (col.documents().iter().map(crate::document::Document::to_output).collect(), &pipeline.stages[..]),
    };
    let input = docs.len();
    for stage in rest {
        docs = apply_stage(docs, stage)?;
    }
    devlog::bench(
        "aggregate",
        serde_json::json!({
            "collection": col.name_str(),
            "stages": pipeline.stages.iter().map(PipelineStage::name).collect::<Vec<_>>(),
            "input": usize_to_u64(input), "result_count": usize_to_u64(docs.len()),
            "duration_ms": u128_to_u64_saturating(start.elapsed().as_millis()),
        })
    );
    Ok(docs)
}

/// Run stages over an in-memory document stream.
///
/// # Errors
/// See [`run_pipeline`].
pub fn apply_stages(mut docs: Vec<BsonDocument>, stages: &[PipelineStage]) -> Result<Vec<BsonDocument>, DbError> {
    for stage in stages {
        docs = apply_stage(docs, stage)?;
    }
    Ok(docs)
}

fn apply_stage(mut docs: Vec<BsonDocument>, stage: &PipelineStage) -> Result<Vec<BsonDocument>, DbError> {
    match stage {
        PipelineStage::Match(filter) => {
            docs.retain(|d| eval_filter(d, filter));
            Ok(docs)
        }
        PipelineStage::Project(items) => docs.iter().map(|d| project(d, items)).collect(),
        PipelineStage::Group { id, fields } => group(&docs, id, fields),
        PipelineStage::Sort(spec) => {
            docs.sort_by(|a, b| compare_docs(a, b, spec));
            Ok(docs)
        }
        PipelineStage::Skip(n) => Ok(docs.into_iter().skip(*n).collect()),
        PipelineStage::Limit(n) => {
            docs.truncate(*n);
            Ok(docs)
        }
    }
}

fn project(doc: &BsonDocument, items: &[(String, ProjectItem)]) -> Result<BsonDocument, DbError> {
    let exclusion = items.iter().any(|(f, i)| f != ID_FIELD && matches!(i, ProjectItem::Exclude));
    if exclusion {
        let mut out = doc.clone();
        for (f, _) in items {
            out.remove(f);
        }
        return Ok(out);
    }
    let mut out = BsonDocument::new();
    let keep_id = !items.iter().any(|(f, i)| f == ID_FIELD && matches!(i, ProjectItem::Exclude));
    if keep_id
        && !items.iter().any(|(f, _)| f == ID_FIELD)
        && let Some(id) = doc.get(ID_FIELD)
    {
        out.insert(ID_FIELD, id.clone());
    }
    for (f, item) in items {
        match item {
            ProjectItem::Include => {
                if let Some(v) = get_path(doc, f) {
                    out.insert(f.clone(), v.clone());
                }
            }
            ProjectItem::Exclude => {}
            // a bare reference to a missing field leaves the output field out
            ProjectItem::Computed(Expr::Field(path)) => {
                if let Some(v) = get_path(doc, path) {
                    out.insert(f.clone(), v.clone());
                }
            }
            ProjectItem::Computed(e) => {
                out.insert(f.clone(), eval_expr(doc, e)?);
            }
        }
    }
    Ok(out)
}

enum AccState {
    Sum { int: Option<i64>, float: f64 },
    Avg { sum: f64, n: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    Count(u64),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum { int: Some(0), float: 0.0 },
            Accumulator::Avg(_) => Self::Avg { sum: 0.0, n: 0 },
            Accumulator::Min(_) => Self::Min(None),
            Accumulator::Max(_) => Self::Max(None),
            Accumulator::Count => Self::Count(0),
        }
    }

    /// Non-numeric values are ignored by `$sum`/`$avg`; nulls by `$min`/`$max`.
    fn feed(&mut self, doc: &BsonDocument, acc: &Accumulator) -> Result<(), DbError> {
        let operand = match acc {
            Accumulator::Sum(e) | Accumulator::Avg(e) | Accumulator::Min(e) | Accumulator::Max(e) => {
                eval_expr(doc, e)?
            }
            Accumulator::Count => Bson::Null,
        };
        match self {
            Self::Sum { int, float } => {
                if let Some(f) = bson_as_f64(&operand) {
                    *float += f;
                    *int = match (&operand, *int) {
                        (Bson::Int32(_) | Bson::Int64(_), Some(i)) => {
                            bson_as_i64(&operand).and_then(|x| i.checked_add(x))
                        }
                        _ => None,
                    };
                }
            }
            Self::Avg { sum, n } => {
                if let Some(f) = bson_as_f64(&operand) {
                    *sum += f;
                    *n += 1;
                }
            }
            Self::Min(cur) => keep_extreme(cur, operand, Ordering::Less),
            Self::Max(cur) => keep_extreme(cur, operand, Ordering::Greater),
            Self::Count(n) => *n += 1,
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { int: Some(i), .. } => int_to_bson(i),
            Self::Sum { float, .. } => Bson::Double(float),
            Self::Avg { n: 0, .. } => Bson::Null,
            Self::Avg { sum, n } => Bson::Double(sum / n as f64),
            Self::Min(v) | Self::Max(v) => v.unwrap_or(Bson::Null),
            Self::Count(n) => int_to_bson(i64::try_from(n).unwrap_or(i64::MAX)),
        }
    }
}

fn keep_extreme(cur: &mut Option<Bson>, candidate: Bson, want: Ordering) {
    if matches!(candidate, Bson::Null | Bson::Undefined) {
        return;
    }
    let replace = cur.as_ref().is_none_or(|c| compare_bson(&candidate, c) == want);
    if replace {
        *cur = Some(candidate);
    }
}

/// Groups are emitted in the order their key was first seen.
fn group(
    docs: &[BsonDocument],
    id: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<BsonDocument>, DbError> {
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in docs {
        let key = eval_expr(doc, id)?;
        let pos = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(p) => p,
            None => {
                groups.push((key, fields.iter().map(|(_, a)| AccState::new(a)).collect()));
                groups.len() - 1
            }
        };
        let states = &mut groups[pos].1;
        for (state, (_, acc)) in states.iter_mut().zip(fields) {
            state.feed(doc, acc)?;
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert(ID_FIELD, key);
            for (state, (name, _)) in states.into_iter().zip(fields) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}
