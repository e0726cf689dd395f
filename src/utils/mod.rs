//! Utility modules: developer logging, filesystem helpers, JSON/BSON conversion, numeric helpers.
pub mod devlog;
pub mod fsutil;
pub mod json;
pub mod num;
