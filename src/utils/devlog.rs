//! Timing lines for finds, counts and pipelines. Lines go to the `bookstore::devlog` log target
//! and, while a test holds a [`CaptureGuard`], to a per-thread buffer.

use serde_json::{Map, Value};
use std::cell::RefCell;

pub const DEVLOG_TARGET: &str = "bookstore::devlog";

thread_local! {
    static CAPTURE: RefCell<Option<Vec<Value>>> = const { RefCell::new(None) };
}

/// Stops capturing on drop.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing bench lines emitted on this thread.
#[must_use]
pub fn capture() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard
}

/// Lines captured so far on this thread. Empties the buffer.
pub fn take_captured() -> Vec<Value> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Emit `{"bench": kind, ..fields}`. Non-object `fields` are ignored.
pub fn bench(kind: &str, fields: Value) {
    let mut line = Map::new();
    line.insert("bench".into(), Value::String(kind.to_string()));
    if let Value::Object(extra) = fields {
        line.extend(extra);
    }
    let line = Value::Object(line);
    log::trace!(target: DEVLOG_TARGET, "{line}");
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line);
        }
    });
}
