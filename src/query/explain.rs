use crate::collection::Collection;
use crate::utils::num::u128_to_u64_saturating;
use serde::Serialize;

use super::exec::execute_find;
use super::plan::Stage;
use super::types::{Filter, FindOptions};

/// Execution statistics for one find, in the shape of an `executionStats` explain.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainReport {
    pub collection: String,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    pub keys_examined: u64,
    pub docs_examined: u64,
    pub n_returned: u64,
    pub execution_time_ms: u64,
}

/// Run the query and report how it was answered. Documents are not modified.
#[must_use]
pub fn explain(col: &Collection, filter: &Filter, opts: &FindOptions) -> ExplainReport {
    let (_, stats) = execute_find(col, filter, opts);
    log::debug!(
        "explain {}: {} via {:?}, {} docs examined",
        col.name_str(),
        stats.stage.as_str(),
        stats.index_name,
        stats.docs_examined
    );
    ExplainReport {
        collection: col.name_str().to_string(),
        stage: stats.stage,
        index_name: stats.index_name,
        keys_examined: stats.keys_examined,
        docs_examined: stats.docs_examined,
        n_returned: stats.n_returned,
        execution_time_ms: u128_to_u64_saturating(stats.elapsed.as_millis()),
    }
}
