//! The three canned book reports, expressed as pipelines and decoded into typed rows.

use crate::collection::Collection;
use crate::document::ID_FIELD;
use crate::errors::DbError;
use crate::query::SortSpec;
use crate::utils::num::{bson_as_f64, bson_as_i64};
use bson::{Bson, Document as BsonDocument};
use serde::Serialize;

use super::exec::run_pipeline;
use super::types::{Accumulator, Expr, Pipeline, PipelineStage, ProjectItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreAverage {
    pub genre: Option<String>,
    pub average_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author: Option<String>,
    pub book_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecadeCount {
    pub decade: Option<String>,
    pub book_count: u64,
}

fn count_by(key: Expr) -> PipelineStage {
    PipelineStage::Group { id: key, fields: vec![("book_count".into(), Accumulator::Sum(Expr::lit(1)))] }
}

#[must_use]
pub fn average_price_by_genre_pipeline() -> Pipeline {
    Pipeline::new(vec![
        PipelineStage::Group {
            id: Expr::field("genre"),
            fields: vec![("average_price".into(), Accumulator::Avg(Expr::field("price")))],
        },
        PipelineStage::Sort(vec![SortSpec::desc("average_price")]),
    ])
}

#[must_use]
pub fn top_author_pipeline() -> Pipeline {
    Pipeline::new(vec![
        count_by(Expr::field("author")),
        PipelineStage::Sort(vec![SortSpec::desc("book_count")]),
        PipelineStage::Limit(1),
    ])
}

/// `"1990s"` from `published_year: 1997`.
#[must_use]
pub fn decade_label_expr() -> Expr {
    let tens = Expr::Floor(Box::new(Expr::Divide(
        Box::new(Expr::field("published_year")),
        Box::new(Expr::lit(10)),
    )));
    Expr::Concat(vec![
        Expr::ToString(Box::new(Expr::Multiply(vec![tens, Expr::lit(10)]))),
        Expr::lit("s"),
    ])
}

#[must_use]
pub fn decade_pipeline() -> Pipeline {
    Pipeline::new(vec![
        PipelineStage::Project(vec![("decade".into(), ProjectItem::Computed(decade_label_expr()))]),
        count_by(Expr::field("decade")),
        PipelineStage::Sort(vec![SortSpec::asc(ID_FIELD)]),
    ])
}

fn key_string(row: &BsonDocument) -> Option<String> {
    match row.get(ID_FIELD) {
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn count_of(row: &BsonDocument) -> u64 {
    row.get("book_count").and_then(bson_as_i64).and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

/// Average price per genre, highest first. Books without a numeric price do not contribute.
///
/// # Errors
/// Propagates pipeline evaluation errors.
pub fn average_price_by_genre(col: &Collection) -> Result<Vec<GenreAverage>, DbError> {
    let rows = run_pipeline(col, &average_price_by_genre_pipeline())?;
    Ok(rows
        .iter()
        .map(|r| GenreAverage {
            genre: key_string(r),
            average_price: r.get("average_price").and_then(bson_as_f64),
        })
        .collect())
}

/// Author with the most books. On a tie the author seen first in insertion order wins.
///
/// # Errors
/// Propagates pipeline evaluation errors.
pub fn top_author_by_count(col: &Collection) -> Result<Option<AuthorCount>, DbError> {
    let rows = run_pipeline(col, &top_author_pipeline())?;
    Ok(rows.first().map(|r| AuthorCount { author: key_string(r), book_count: count_of(r) }))
}

/// Book counts per decade label, ascending by label.
///
/// # Errors
/// Propagates pipeline evaluation errors.
pub fn count_by_decade(col: &Collection) -> Result<Vec<DecadeCount>, DbError> {
    let rows = run_pipeline(col, &decade_pipeline())?;
    Ok(rows.iter().map(|r| DecadeCount { decade: key_string(r), book_count: count_of(r) }).collect())
}
