use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type CollectionName = String;

/// Store-assigned identity of a document, surfaced as the `_id` field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// # Errors
    /// Returns `InvalidDocumentId` when `s` is not a UUID.
    pub fn parse_str(s: &str) -> Result<Self, DbError> {
        Uuid::parse_str(s).map(Self).map_err(|e| DbError::InvalidDocumentId(format!("{s}: {e}")))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
