use std::path::PathBuf;

/// Canned aggregation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    AvgPrice,
    TopAuthor,
    Decades,
}

/// One CLI action against the configured collection. JSON arguments use the shell grammars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Find {
        filter_json: String,
        project: Option<String>,
        sort: Option<String>,
        skip: Option<usize>,
        limit: Option<usize>,
        /// One-based page of `page_size` documents; overrides skip/limit.
        page: Option<usize>,
    },
    Count {
        filter_json: String,
    },
    UpdateOne {
        filter_json: String,
        update_json: String,
    },
    DeleteOne {
        filter_json: String,
    },
    Aggregate {
        pipeline_json: String,
    },
    Report(ReportKind),
    CreateIndex {
        keys_json: String,
        name: Option<String>,
    },
    DropIndex {
        name: String,
    },
    ListIndexes,
    ListCollections,
    Explain {
        filter_json: String,
        sort: Option<String>,
        skip: Option<usize>,
        limit: Option<usize>,
    },
    Import {
        file: PathBuf,
        format: Option<String>,
        fail_fast: bool,
    },
}
