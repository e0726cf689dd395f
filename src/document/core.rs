use crate::document::types::Metadata;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};

/// Name of the identity field in query output.
pub const ID_FIELD: &str = "_id";

/// A stored document: store-assigned identity, schema-less BSON body and bookkeeping metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    /// Wraps a body under a fresh identity. A caller-supplied `_id` in the body is dropped.
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self::with_id(DocumentId::new(), data)
    }

    #[must_use]
    pub fn with_id(id: DocumentId, mut data: BsonDocument) -> Self {
        data.remove(ID_FIELD);
        Self { id, data, metadata: Metadata::new() }
    }

    pub fn update(&mut self, mut new_data: BsonDocument) {
        new_data.remove(ID_FIELD);
        self.data = new_data;
        self.metadata.touch();
    }

    /// The document as queries see it: `_id` first, then the body fields in stored order.
    #[must_use]
    pub fn to_output(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        out.insert(ID_FIELD, Bson::String(self.id.to_string()));
        for (k, v) in &self.data {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}
