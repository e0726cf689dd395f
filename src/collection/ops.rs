use super::core::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::index::{index_insert_all, index_remove_all};
use crate::logger::log_audit;
use crate::types::DocumentId;
use crate::wal::{WalOp, encode_body};
use bson::Document as BsonDocument;

impl Collection {
    /// Log, store and index a document. Returns its id.
    ///
    /// # Errors
    /// Returns an error when the WAL append fails; memory is left untouched in that case.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId, DbError> {
        let _guard = self.build_lock.read();
        let id = document.id.clone();
        self.log_op(WalOp::Insert {
            collection: self.name_str().to_string(),
            id: id.to_string(),
            body: encode_body(&document.data)?,
        })?;
        self.apply_insert(document);
        log_audit("insert", self.name_str(), &id.to_string());
        Ok(id)
    }

    pub(crate) fn apply_insert(&self, document: Document) {
        index_insert_all(&mut self.indexes.write(), &document.data, &document.id);
        self.docs.write().push(document);
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.docs.read().get(id).cloned()
    }

    /// Replace the body of `id`, keeping its insertion position. `Ok(false)` when absent.
    ///
    /// # Errors
    /// Returns an error when the WAL append fails.
    pub fn update_document(&self, id: &DocumentId, new_data: BsonDocument) -> Result<bool, DbError> {
        let _guard = self.build_lock.read();
        if self.docs.read().get(id).is_none() {
            return Ok(false);
        }
        self.log_op(WalOp::Update {
            collection: self.name_str().to_string(),
            id: id.to_string(),
            body: encode_body(&new_data)?,
        })?;
        let applied = self.apply_update(id, new_data);
        if applied {
            log_audit("update", self.name_str(), &id.to_string());
        }
        Ok(applied)
    }

    pub(crate) fn apply_update(&self, id: &DocumentId, new_data: BsonDocument) -> bool {
        let (old, new) = {
            let mut docs = self.docs.write();
            let Some(doc) = docs.get_mut(id) else { return false };
            let old = doc.data.clone();
            doc.update(new_data);
            (old, doc.data.clone())
        };
        let mut mgr = self.indexes.write();
        index_remove_all(&mut mgr, &old, id);
        index_insert_all(&mut mgr, &new, id);
        true
    }

    /// # Errors
    /// Returns an error when the WAL append fails.
    pub fn delete_document(&self, id: &DocumentId) -> Result<bool, DbError> {
        let _guard = self.build_lock.read();
        if self.docs.read().get(id).is_none() {
            return Ok(false);
        }
        self.log_op(WalOp::Delete { collection: self.name_str().to_string(), id: id.to_string() })?;
        let removed = self.apply_delete(id).is_some();
        if removed {
            log_audit("delete", self.name_str(), &id.to_string());
        }
        Ok(removed)
    }

    pub(crate) fn apply_delete(&self, id: &DocumentId) -> Option<Document> {
        let old = self.docs.write().remove(id)?;
        index_remove_all(&mut self.indexes.write(), &old.data, id);
        Some(old)
    }

    /// All documents in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.docs.read().by_seq.values().cloned().collect()
    }

    /// Ids in insertion order, without cloning bodies.
    #[must_use]
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.docs.read().by_seq.values().map(|d| d.id.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().by_seq.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insertion sequence of `id`; lower values were inserted earlier.
    #[must_use]
    pub fn seq_of(&self, id: &DocumentId) -> Option<u64> {
        self.docs.read().seq_of.get(id).copied()
    }
}
