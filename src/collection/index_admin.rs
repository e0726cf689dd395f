use super::core::Collection;
use crate::errors::DbError;
use crate::index::{IndexDescriptor, IndexSpec};
use crate::wal::WalOp;

impl Collection {
    /// Declare an index and build it from the current documents. Re-declaring an existing
    /// spec is a no-op that returns the same name.
    ///
    /// # Errors
    /// Returns `QueryError` for an invalid spec or a name clash, or a WAL error.
    pub fn create_index(&self, spec: IndexSpec) -> Result<String, DbError> {
        let _wguard = self.build_lock.write();
        let name = spec.resolved_name();
        if self.build_index(spec.clone())?.is_none() {
            return Ok(name);
        }
        if let Err(e) = self.log_op(WalOp::CreateIndex { collection: self.name_str().to_string(), spec }) {
            let _ = self.indexes.write().drop_index(&name);
            return Err(e);
        }
        log::info!("created index {name} on {}", self.name_str());
        Ok(name)
    }

    /// Register and populate an index without logging. `None` when it already exists.
    pub(crate) fn build_index(&self, spec: IndexSpec) -> Result<Option<String>, DbError> {
        let mut mgr = self.indexes.write();
        let Some(name) = mgr.create_index(spec)? else { return Ok(None) };
        let start = std::time::Instant::now();
        let docs = self.docs.read();
        if let Some(idx) = mgr.indexes.get_mut(&name) {
            for doc in docs.by_seq.values() {
                idx.insert(&doc.data, &doc.id);
            }
            idx.stats.build_time_ms = start.elapsed().as_millis();
        }
        Ok(Some(name))
    }

    /// # Errors
    /// Returns `NoSuchIndex` when nothing is registered under `name`, or a WAL error.
    pub fn drop_index(&self, name: &str) -> Result<(), DbError> {
        let _wguard = self.build_lock.write();
        if !self.indexes.read().indexes.contains_key(name) {
            return Err(DbError::NoSuchIndex(name.to_string()));
        }
        self.log_op(WalOp::DropIndex { collection: self.name_str().to_string(), name: name.to_string() })?;
        self.indexes.write().drop_index(name)?;
        log::info!("dropped index {name} on {}", self.name_str());
        Ok(())
    }

    #[must_use]
    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes.read().descriptors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::query::Order;
    use bson::doc;

    #[test]
    fn build_covers_existing_documents() {
        let col = Collection::new("t", None);
        for y in [1990, 2000, 2010] {
            col.insert_document(Document::new(doc! {"published_year": y})).unwrap();
        }
        let name = col.create_index(IndexSpec::single("published_year", Order::Desc)).unwrap();
        assert_eq!(name, "published_year_-1");
        let list = col.list_indexes();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].stats.entries, 3);
        assert_eq!(list[0].keys, vec![("published_year".to_string(), -1)]);
    }

    #[test]
    fn redeclare_is_idempotent() {
        let col = Collection::new("t", None);
        let a = col.create_index(IndexSpec::single("title", Order::Asc)).unwrap();
        let b = col.create_index(IndexSpec::single("title", Order::Asc)).unwrap();
        assert_eq!(a, b);
        assert_eq!(col.list_indexes().len(), 1);
    }

    #[test]
    fn drop_unknown_index_fails() {
        let col = Collection::new("t", None);
        assert!(matches!(col.drop_index("nope"), Err(DbError::NoSuchIndex(_))));
    }
}
