use crate::collection::Collection;
use crate::document::{Document, ID_FIELD};
use crate::errors::DbError;
use crate::utils::devlog;
use crate::utils::num::{bson_as_f64, bson_as_i64, int_to_bson, u128_to_u64_saturating, usize_to_u64};
use bson::{Bson, Document as BsonDocument};
use std::time::{Duration, Instant};

use super::cursor::Cursor;
use super::eval::{compare_docs, eval_filter, get_path, project_fields};
use super::plan::{Stage, plan};
use super::types::{DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};

/// Counters gathered while answering one find.
#[derive(Debug, Clone)]
pub(crate) struct ExecStats {
    pub stage: Stage,
    pub index_name: Option<String>,
    pub keys_examined: u64,
    pub docs_examined: u64,
    pub n_returned: u64,
    pub elapsed: Duration,
}

/// Filter, sort (stable), skip/limit, then project.
pub(crate) fn execute_find(
    col: &Collection,
    filter: &Filter,
    opts: &FindOptions,
) -> (Vec<BsonDocument>, ExecStats) {
    let start = Instant::now();
    let p = plan(col, filter);
    let docs_examined = usize_to_u64(p.candidates.len());
    let mut matched: Vec<Document> =
        p.candidates.into_iter().filter(|d| eval_filter(&d.data, filter)).collect();

    if let Some(sort) = &opts.sort {
        if sort.len() > super::types::MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        matched.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(usize::MAX);
    let out: Vec<BsonDocument> = matched
        .iter()
        .skip(skip)
        .take(limit)
        .map(|d| {
            let full = d.to_output();
            match &opts.projection {
                Some(p) => project_fields(&full, p),
                None => full,
            }
        })
        .collect();

    let stats = ExecStats {
        stage: p.stage,
        index_name: p.index_name,
        keys_examined: p.keys_examined,
        docs_examined,
        n_returned: usize_to_u64(out.len()),
        elapsed: start.elapsed(),
    };
    devlog::bench(
        "query",
        serde_json::json!({
            "op": "find", "collection": col.name_str(),
            "duration_ms": u128_to_u64_saturating(stats.elapsed.as_millis()),
            "stage": stats.stage.as_str(), "docs_examined": stats.docs_examined,
            "result_count": stats.n_returned, "limit": opts.limit, "skip": opts.skip,
        })
    );
    (out, stats)
}

#[must_use]
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Cursor {
    Cursor::new(execute_find(col, filter, opts).0)
}

#[must_use]
pub fn count_docs(col: &Collection, filter: &Filter) -> usize {
    let start = Instant::now();
    let n = plan(col, filter).candidates.iter().filter(|d| eval_filter(&d.data, filter)).count();
    devlog::bench(
        "query",
        serde_json::json!({
            "op": "count", "collection": col.name_str(),
            "duration_ms": u128_to_u64_saturating(start.elapsed().as_millis()), "result_count": n,
        })
    );
    n
}

fn first_match(col: &Collection, filter: &Filter) -> Option<Document> {
    plan(col, filter).candidates.into_iter().find(|d| eval_filter(&d.data, filter))
}

/// Apply `update` to the first match in insertion order.
///
/// # Errors
/// Returns `QueryError` for an empty update, one that touches `_id`, or `$inc` on a
/// non-numeric value; a WAL error if logging fails.
pub fn update_one(col: &Collection, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
    validate_update(update)?;
    let Some(doc) = first_match(col, filter) else {
        return Ok(UpdateReport { matched: 0, modified: 0 });
    };
    let mut data = doc.data;
    if !apply_update(&mut data, update)? {
        return Ok(UpdateReport { matched: 1, modified: 0 });
    }
    let modified = col.update_document(&doc.id, data)?;
    Ok(UpdateReport { matched: 1, modified: u64::from(modified) })
}

/// Delete the first match in insertion order.
///
/// # Errors
/// Returns a WAL error if logging fails.
pub fn delete_one(col: &Collection, filter: &Filter) -> Result<DeleteReport, DbError> {
    let Some(doc) = first_match(col, filter) else {
        return Ok(DeleteReport { deleted: 0 });
    };
    let deleted = col.delete_document(&doc.id)?;
    Ok(DeleteReport { deleted: u64::from(deleted) })
}

fn validate_update(update: &UpdateDoc) -> Result<(), DbError> {
    if update.is_empty() {
        return Err(DbError::QueryError("update has no operators".into()));
    }
    let touches_id = update.set.iter().map(|(k, _)| k.as_str())
        .chain(update.inc.iter().map(|(k, _)| k.as_str()))
        .chain(update.unset.iter().map(String::as_str))
        .any(|k| k == ID_FIELD || k.starts_with("_id."));
    if touches_id {
        return Err(DbError::QueryError("_id cannot be modified".into()));
    }
    Ok(())
}

fn set_path(doc: &mut BsonDocument, path: &str, value: Bson) -> Result<bool, DbError> {
    match path.split_once('.') {
        None => {
            let old = doc.insert(path, value.clone());
            Ok(old.as_ref() != Some(&value))
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => set_path(sub, rest, value),
            Some(_) => Err(DbError::QueryError(format!("cannot set {path}: {head} is not a document"))),
            None => {
                let mut sub = BsonDocument::new();
                set_path(&mut sub, rest, value)?;
                doc.insert(head, sub);
                Ok(true)
            }
        },
    }
}

fn unset_path(doc: &mut BsonDocument, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.remove(path).is_some(),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => unset_path(sub, rest),
            _ => false,
        },
    }
}

/// Integer fields stay integral when the increment is whole; anything else becomes a double.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn incremented(current: Option<&Bson>, by: f64, path: &str) -> Result<Bson, DbError> {
    let whole_by = by.fract() == 0.0 && by.abs() < 9.0e15;
    match current {
        None | Some(Bson::Null) if whole_by => Ok(int_to_bson(by as i64)),
        None | Some(Bson::Null) => Ok(Bson::Double(by)),
        Some(v @ (Bson::Int32(_) | Bson::Int64(_))) if whole_by => {
            let i = bson_as_i64(v).unwrap_or(0);
            Ok(i.checked_add(by as i64).map_or(Bson::Double(i as f64 + by), int_to_bson))
        }
        Some(v) => bson_as_f64(v)
            .map(|f| Bson::Double(f + by))
            .ok_or_else(|| DbError::QueryError(format!("$inc on non-numeric field {path}"))),
    }
}

/// Apply `$set`, `$inc` and `$unset` to a document body. Returns whether anything changed.
///
/// # Errors
/// Returns `QueryError` when `$inc` targets a non-numeric value or a dotted path runs
/// through a value that is not a document.
pub fn apply_update(doc: &mut BsonDocument, upd: &UpdateDoc) -> Result<bool, DbError> {
    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(doc, k, v.clone())?;
    }
    for (k, by) in &upd.inc {
        let next = incremented(get_path(doc, k), *by, k)?;
        changed |= set_path(doc, k, next)?;
    }
    for k in &upd.unset {
        changed |= unset_path(doc, k);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Projection, SortSpec};
    use bson::doc;

    fn shelf() -> Collection {
        let col = Collection::new("books", None);
        for (t, a, p) in [("A", "x", 3.0), ("B", "y", 1.0), ("C", "x", 2.0), ("D", "x", 1.0)] {
            col.insert_document(Document::new(doc! {"title": t, "author": a, "price": p})).unwrap();
        }
        col
    }

    #[test]
    fn update_doc_set_inc_unset() {
        let mut d = doc! {"x": 1, "y": 2, "z": true};
        let ud = UpdateDoc {
            set: vec![("y".into(), Bson::Int32(5))],
            inc: vec![("x".into(), 2.0)],
            unset: vec!["z".into()],
        };
        assert!(apply_update(&mut d, &ud).unwrap());
        assert_eq!(d, doc! {"x": 3, "y": 5});
    }

    #[test]
    fn set_creates_nested_paths() {
        let mut d = doc! {};
        assert!(apply_update(&mut d, &UpdateDoc::set("meta.stock", 4)).unwrap());
        assert_eq!(d, doc! {"meta": {"stock": 4}});
        assert!(!apply_update(&mut d, &UpdateDoc::set("meta.stock", 4)).unwrap());
    }

    #[test]
    fn inc_on_string_is_rejected() {
        let mut d = doc! {"title": "x"};
        let ud = UpdateDoc { inc: vec![("title".into(), 1.0)], ..UpdateDoc::default() };
        assert!(matches!(apply_update(&mut d, &ud), Err(DbError::QueryError(_))));
    }

    #[test]
    fn inc_fraction_turns_double() {
        let mut d = doc! {"price": 10};
        let ud = UpdateDoc { inc: vec![("price".into(), 0.5)], ..UpdateDoc::default() };
        apply_update(&mut d, &ud).unwrap();
        assert_eq!(d.get_f64("price").unwrap(), 10.5);
    }

    #[test]
    fn update_one_touches_first_inserted_match() {
        let col = shelf();
        let r = update_one(&col, &Filter::eq("author", "x"), &UpdateDoc::set("price", 9.0)).unwrap();
        assert_eq!(r, UpdateReport { matched: 1, modified: 1 });
        let docs = col.documents();
        assert_eq!(docs[0].data.get_f64("price").unwrap(), 9.0);
        assert_eq!(docs[2].data.get_f64("price").unwrap(), 2.0);
    }

    #[test]
    fn update_one_without_match_is_not_an_error() {
        let col = shelf();
        let r = update_one(&col, &Filter::eq("title", "Z"), &UpdateDoc::set("price", 1.0)).unwrap();
        assert_eq!(r, UpdateReport::default());
    }

    #[test]
    fn update_refuses_id_changes() {
        let col = shelf();
        let err = update_one(&col, &Filter::True, &UpdateDoc::set("_id", "x")).unwrap_err();
        assert!(matches!(err, DbError::QueryError(_)));
    }

    #[test]
    fn delete_one_removes_single_document() {
        let col = shelf();
        assert_eq!(delete_one(&col, &Filter::eq("author", "x")).unwrap().deleted, 1);
        assert_eq!(count_docs(&col, &Filter::eq("author", "x")), 2);
        assert!(count_docs(&col, &Filter::eq("title", "A")) == 0);
    }

    #[test]
    fn sort_is_stable_and_projection_applies_last() {
        let col = shelf();
        let opts = FindOptions::default()
            .sorted_by(SortSpec::asc("price"))
            .projected(Projection::include(["title"]).without_id());
        let got: Vec<BsonDocument> = find_docs(&col, &Filter::True, &opts).collect();
        assert_eq!(
            got,
            vec![doc! {"title": "B"}, doc! {"title": "D"}, doc! {"title": "C"}, doc! {"title": "A"}]
        );
    }

    #[test]
    fn skip_past_end_yields_empty_page() {
        let col = shelf();
        let out = find_docs(&col, &Filter::True, &FindOptions::page(3, 5)).to_vec();
        assert!(out.is_empty());
    }

    #[test]
    fn find_emits_bench_line() {
        let _g = devlog::capture();
        let col = shelf();
        let _ = find_docs(&col, &Filter::True, &FindOptions::default());
        let lines = devlog::take_captured();
        assert!(lines.iter().any(|l| l["op"] == "find" && l["stage"] == "COLLSCAN"));
    }
}
