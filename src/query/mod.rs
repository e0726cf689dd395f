// Submodules for separation of concerns
mod cursor;
mod eval;
mod exec;
mod explain;
mod parse;
mod plan;
mod types;

pub use cursor::Cursor;
pub use eval::{compare_bson, compare_docs, eval_filter, get_path, project_fields, values_equal};
pub use exec::{apply_update, count_docs, delete_one, find_docs, update_one};
pub(crate) use exec::execute_find;
pub use explain::{ExplainReport, explain};
pub use parse::{
    filter_from_value, parse_filter_json, parse_projection_json, parse_sort_json, parse_update_json,
    sort_from_value,
};
pub use plan::Stage;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Order, Projection, SortSpec, UpdateDoc, UpdateReport,
};
