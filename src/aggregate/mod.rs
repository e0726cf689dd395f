mod exec;
mod expr;
mod parse;
pub mod reports;
mod types;

pub use exec::{apply_stages, run_pipeline};
pub use expr::eval_expr;
pub use parse::{expr_from_value, parse_pipeline_json};
pub use types::{Accumulator, Expr, Pipeline, PipelineStage, ProjectItem};
