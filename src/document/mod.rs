mod core;
mod types;

pub use core::{Document, ID_FIELD};
pub use types::Metadata;
