mod command;
mod runner;
mod util;

pub use command::{Command, ReportKind};
pub use runner::{OutputMode, RunContext, run, run_to};
