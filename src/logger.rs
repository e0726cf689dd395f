//! log4rs wiring. Application lines go to the root appender; mutations are written to a
//! separate audit file through the `bookstore::audit` target, and developer benchmark lines
//! (`devlog::bench`) optionally to their own file.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const AUDIT_TARGET: &str = "bookstore::audit";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

type LogResult = Result<(), Box<dyn std::error::Error>>;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// True once any logger is installed, ours or a foreign one that raised the max level.
fn logger_installed() -> bool {
    INSTALLED.load(Ordering::Acquire) || log::max_level() != LevelFilter::Off
}

fn install(config: Config) -> LogResult {
    log4rs::init_config(config)?;
    INSTALLED.store(true, Ordering::Release);
    Ok(())
}

fn rolling(
    dir: &Path,
    file: &str,
    roll_pattern: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", dir.join(roll_pattern).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(file), Box::new(policy))?)
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initializes logging under `{base}/{db_name}_logs/`: `{db_name}.log` for application lines
/// and `{db_name}_audit.log` for mutations. Does nothing, and creates nothing, when a logger
/// is already installed.
///
/// # Errors
/// Returns an error if the directory or an appender cannot be created.
pub fn init_for_db_in(base_dir: &Path, db_name: &str) -> LogResult {
    if logger_installed() {
        return Ok(());
    }
    let dir = base_dir.join(format!("{db_name}_logs"));
    std::fs::create_dir_all(&dir)?;
    let app = rolling(&dir, &format!("{db_name}.log"), &format!("{db_name}.{{}}.log"), DEFAULT_RETENTION)?;
    let audit = rolling(
        &dir,
        &format!("{db_name}_audit.log"),
        &format!("{db_name}.audit.{{}}.log"),
        DEFAULT_RETENTION,
    )?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info))
        .build(Root::builder().appender("app").build(LevelFilter::Info))?;
    install(config)
}

/// Configure process-wide logging in `dir` (current directory when `None`): `app.log`,
/// `audit.log` and, with `devlog`, `devlog.log` for benchmark lines.
///
/// # Errors
/// Returns an error if an appender cannot be built or a logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    devlog: bool,
) -> LogResult {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(DEFAULT_RETENTION);
    let lvl = parse_level(level);
    let app = rolling(&base, "app.log", "app.{}.log", keep)?;
    let audit = rolling(&base, "audit.log", "audit.{}.log", keep)?;
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl));
    let devlog_target = crate::utils::devlog::DEVLOG_TARGET;
    builder = if devlog {
        let dev = rolling(&base, "devlog.log", "devlog.{}.log", keep)?;
        builder
            .appender(Appender::builder().build("devlog", Box::new(dev)))
            .logger(Logger::builder().appender("devlog").additive(false).build(devlog_target, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(devlog_target, LevelFilter::Off))
    };
    let config = builder.build(Root::builder().appender("app").build(lvl))?;
    install(config)
}

/// One JSON audit line per applied mutation.
pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    let line = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "op": op,
        "collection": collection,
        "doc_id": doc_id,
    });
    log::info!(target: AUDIT_TARGET, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }
}
