use crate::Database;
use crate::aggregate::{self, parse_pipeline_json, reports};
use crate::errors::DbError;
use crate::import::ImportOptions;
use crate::index::parse_index_json;
use crate::query::{self, FindOptions};
use crate::utils::json::bson_document_to_json;
use bson::Document as BsonDocument;
use serde::Serialize;
use std::io::Write;

use super::command::{Command, ReportKind};
use super::util::parse_import_format;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Settings shared by every command of one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub collection: String,
    pub page_size: usize,
    pub mode: OutputMode,
}

type RunResult = Result<(), Box<dyn std::error::Error>>;

fn find_options(
    project: Option<&str>,
    sort: Option<&str>,
    skip: Option<usize>,
    limit: Option<usize>,
) -> Result<FindOptions, DbError> {
    let mut opts = FindOptions { skip, limit, ..FindOptions::default() };
    if let Some(p) = project {
        opts.projection = query::parse_projection_json(p)?;
    }
    if let Some(s) = sort {
        let spec = query::parse_sort_json(s)?;
        if !spec.is_empty() {
            opts.sort = Some(spec);
        }
    }
    Ok(opts)
}

fn write_docs<W: Write>(out: &mut W, docs: &[BsonDocument]) -> RunResult {
    for d in docs {
        writeln!(out, "{}", bson_document_to_json(d))?;
    }
    Ok(())
}

fn write_rows<W: Write, T: Serialize>(out: &mut W, rows: &[T]) -> RunResult {
    for r in rows {
        writeln!(out, "{}", serde_json::to_string(r)?)?;
    }
    Ok(())
}

fn write_report<W: Write>(db: &Database, ctx: &RunContext, kind: ReportKind, out: &mut W) -> RunResult {
    let col = db.collection(&ctx.collection)?;
    match kind {
        ReportKind::AvgPrice => {
            let rows = reports::average_price_by_genre(&col)?;
            if ctx.mode == OutputMode::Json {
                return write_rows(out, &rows);
            }
            for r in rows {
                let avg = r.average_price.map_or_else(|| "-".to_string(), |a| format!("{a:.2}"));
                writeln!(out, "{}\t{avg}", r.genre.as_deref().unwrap_or("(none)"))?;
            }
        }
        ReportKind::TopAuthor => {
            let top = reports::top_author_by_count(&col)?;
            match (ctx.mode, top) {
                (OutputMode::Json, Some(t)) => writeln!(out, "{}", serde_json::to_string(&t)?)?,
                (OutputMode::Json, None) => writeln!(out, "null")?,
                (OutputMode::Human, Some(t)) => {
                    writeln!(out, "{}\t{}", t.author.as_deref().unwrap_or("(none)"), t.book_count)?;
                }
                (OutputMode::Human, None) => writeln!(out, "no books")?,
            }
        }
        ReportKind::Decades => {
            let rows = reports::count_by_decade(&col)?;
            if ctx.mode == OutputMode::Json {
                return write_rows(out, &rows);
            }
            for r in rows {
                writeln!(out, "{}\t{}", r.decade.as_deref().unwrap_or("(none)"), r.book_count)?;
            }
        }
    }
    Ok(())
}

/// Execute `cmd`, writing results to `out`. Documents are printed one JSON object per line in
/// both modes; summaries are plain text unless `OutputMode::Json`.
///
/// # Errors
/// Returns parse errors for malformed JSON arguments, `NoSuchCollection`, and store errors.
pub fn run_to<W: Write>(db: &Database, ctx: &RunContext, cmd: Command, out: &mut W) -> RunResult {
    let json = ctx.mode == OutputMode::Json;
    match cmd {
        Command::Find { filter_json, project, sort, skip, limit, page } => {
            let col = db.collection(&ctx.collection)?;
            let filter = query::parse_filter_json(&filter_json)?;
            let (skip, limit) = match page {
                Some(0) => return Err("page numbers start at 1".into()),
                Some(p) => (Some((p - 1).saturating_mul(ctx.page_size)), Some(ctx.page_size)),
                None => (skip, limit),
            };
            let opts = find_options(project.as_deref(), sort.as_deref(), skip, limit)?;
            let docs = query::find_docs(&col, &filter, &opts).to_vec();
            write_docs(out, &docs)
        }
        Command::Count { filter_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let n = db.count(&ctx.collection, &filter)?;
            if json {
                writeln!(out, "{}", serde_json::json!({ "count": n }))?;
            } else {
                writeln!(out, "{n}")?;
            }
            Ok(())
        }
        Command::UpdateOne { filter_json, update_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let update = query::parse_update_json(&update_json)?;
            let r = db.update_one(&ctx.collection, &filter, &update)?;
            if json {
                writeln!(out, "{}", serde_json::to_string(&r)?)?;
            } else {
                writeln!(out, "matched={} modified={}", r.matched, r.modified)?;
            }
            Ok(())
        }
        Command::DeleteOne { filter_json } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let r = db.delete_one(&ctx.collection, &filter)?;
            if json {
                writeln!(out, "{}", serde_json::to_string(&r)?)?;
            } else {
                writeln!(out, "deleted={}", r.deleted)?;
            }
            Ok(())
        }
        Command::Aggregate { pipeline_json } => {
            let pipeline = parse_pipeline_json(&pipeline_json)?;
            let rows = aggregate::run_pipeline(db.collection(&ctx.collection)?.as_ref(), &pipeline)?;
            write_docs(out, &rows)
        }
        Command::Report(kind) => write_report(db, ctx, kind, out),
        Command::CreateIndex { keys_json, name } => {
            let mut spec = parse_index_json(&keys_json)?;
            if let Some(n) = name {
                spec = spec.named(n);
            }
            let name = db.create_index(&ctx.collection, spec)?;
            if json {
                writeln!(out, "{}", serde_json::json!({ "index": name }))?;
            } else {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
        Command::DropIndex { name } => {
            db.drop_index(&ctx.collection, &name)?;
            if json {
                writeln!(out, "{}", serde_json::json!({ "dropped": name }))?;
            } else {
                writeln!(out, "dropped {name}")?;
            }
            Ok(())
        }
        Command::ListIndexes => {
            let idx = db.list_indexes(&ctx.collection)?;
            if json {
                return write_rows(out, &idx);
            }
            for d in idx {
                let keys: Vec<String> = d.keys.iter().map(|(f, dir)| format!("{f}:{dir}")).collect();
                writeln!(out, "{}\t{}", d.name, keys.join(","))?;
            }
            Ok(())
        }
        Command::ListCollections => {
            let names = db.list_collection_names();
            if json {
                writeln!(out, "{}", serde_json::to_string(&names)?)?;
            } else {
                for n in names {
                    writeln!(out, "{n}")?;
                }
            }
            Ok(())
        }
        Command::Explain { filter_json, sort, skip, limit } => {
            let filter = query::parse_filter_json(&filter_json)?;
            let opts = find_options(None, sort.as_deref(), skip, limit)?;
            let report = db.explain(&ctx.collection, &filter, &opts)?;
            if json {
                writeln!(out, "{}", serde_json::to_string(&report)?)?;
            } else {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
            Ok(())
        }
        Command::Import { file, format, fail_fast } => {
            let opts = ImportOptions {
                format: parse_import_format(format.as_deref()),
                skip_errors: !fail_fast,
                ..ImportOptions::default()
            };
            let report = db.import_file(&ctx.collection, &file, &opts)?;
            if json {
                writeln!(out, "{}", serde_json::to_string(&report)?)?;
            } else {
                writeln!(out, "inserted={} skipped={}", report.inserted, report.skipped)?;
            }
            Ok(())
        }
    }
}

/// [`run_to`] on standard output.
///
/// # Errors
/// See [`run_to`].
pub fn run(db: &Database, ctx: &RunContext, cmd: Command) -> RunResult {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    run_to(db, ctx, cmd, &mut lock)
}
