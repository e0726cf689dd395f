use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::types::{CollectionName, DocumentId};
use crate::utils::fsutil::wal_path_for;
use crate::wal::{Wal, WalOp, WalRecord, decode_body};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collection registry plus the shared WAL handle.
pub struct Engine {
    pub(crate) collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
    wal: Option<Arc<Mutex<Wal>>>,
    db_path: Option<PathBuf>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db_path", &self.db_path)
            .field("collections", &self.list_collection_names())
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn in_memory() -> Self {
        Self { collections: RwLock::new(HashMap::new()), wal: None, db_path: None }
    }

    /// Open (or create) the database marker at `db_path` and its `{stem}.wal`.
    /// Replays the WAL to rebuild in-memory state.
    ///
    /// # Errors
    /// Returns an error when either file cannot be created or a complete record fails to apply.
    pub fn open(db_path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        if !db_path.exists() {
            File::create(db_path)
                .map_err(|e| DbError::StoreUnavailable(format!("{}: {e}", db_path.display())))?;
        }
        let wal_path = wal_path_for(db_path);
        let wal = Wal::open(&wal_path)?;
        let records = wal.read_all()?;
        let engine = Self {
            collections: RwLock::new(HashMap::new()),
            wal: Some(Arc::new(Mutex::new(wal))),
            db_path: Some(db_path.to_path_buf()),
        };
        let n = records.len();
        for rec in records {
            engine.replay(rec)?;
        }
        log::info!("opened {} ({n} wal records replayed)", db_path.display());
        Ok(engine)
    }

    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    fn registered(&self, name: &str) -> Arc<Collection> {
        let mut cols = self.collections.write();
        Arc::clone(
            cols.entry(name.to_string())
                .or_insert_with(|| Arc::new(Collection::new(name, self.wal.clone()))),
        )
    }

    fn replay(&self, rec: WalRecord) -> Result<(), DbError> {
        match rec.op {
            WalOp::CreateCollection { collection } => {
                self.registered(&collection);
            }
            WalOp::Insert { collection, id, body } => {
                let doc = Document::with_id(DocumentId::parse_str(&id)?, decode_body(&body)?);
                self.registered(&collection).apply_insert(doc);
            }
            WalOp::Update { collection, id, body } => {
                let id = DocumentId::parse_str(&id)?;
                if !self.registered(&collection).apply_update(&id, decode_body(&body)?) {
                    log::warn!("wal #{}: update of unknown document {id} in {collection}", rec.seq);
                }
            }
            WalOp::Delete { collection, id } => {
                let id = DocumentId::parse_str(&id)?;
                self.registered(&collection).apply_delete(&id);
            }
            WalOp::CreateIndex { collection, spec } => {
                self.registered(&collection).build_index(spec)?;
            }
            WalOp::DropIndex { collection, name } => {
                if self.registered(&collection).indexes.write().drop_index(&name).is_err() {
                    log::warn!("wal #{}: drop of unknown index {name} in {collection}", rec.seq);
                }
            }
        }
        Ok(())
    }

    /// # Errors
    /// Returns `CollectionAlreadyExists`, or a WAL error.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        validate_collection_name(name)?;
        let mut cols = self.collections.write();
        if cols.contains_key(name) {
            return Err(DbError::CollectionAlreadyExists(name.to_string()));
        }
        if let Some(wal) = &self.wal {
            wal.lock().append(WalOp::CreateCollection { collection: name.to_string() })?;
        }
        let col = Arc::new(Collection::new(name, self.wal.clone()));
        cols.insert(name.to_string(), Arc::clone(&col));
        log::info!("created collection {name}");
        Ok(col)
    }

    /// Existing collection, or a newly created one.
    ///
    /// # Errors
    /// See [`Engine::create_collection`].
    pub fn ensure_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        match self.get_collection(name) {
            Some(c) => Ok(c),
            None => match self.create_collection(name) {
                Err(DbError::CollectionAlreadyExists(_)) => self.collection(name),
                other => other,
            },
        }
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// # Errors
    /// Returns `NoSuchCollection` when `name` is not registered.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    /// Sorted for stable output.
    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate_collection_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() || name.starts_with('$') || name.contains('\0') {
        return Err(DbError::QueryError(format!("invalid collection name {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn create_twice_is_an_error_but_ensure_is_not() {
        let eng = Engine::in_memory();
        eng.create_collection("books").unwrap();
        assert!(matches!(eng.create_collection("books"), Err(DbError::CollectionAlreadyExists(_))));
        assert!(eng.ensure_collection("books").is_ok());
        assert_eq!(eng.list_collection_names(), vec!["books".to_string()]);
        assert!(matches!(eng.collection("nope"), Err(DbError::NoSuchCollection(_))));
        assert!(eng.create_collection("").is_err());
    }

    #[test]
    fn reopen_replays_documents_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let (kept, gone) = {
            let eng = Engine::open(&path).unwrap();
            let col = eng.create_collection("books").unwrap();
            let kept = col.insert_document(Document::new(doc! {"title": "Dune"})).unwrap();
            let gone = col.insert_document(Document::new(doc! {"title": "Emma"})).unwrap();
            col.update_document(&kept, doc! {"title": "Dune", "price": 9.5}).unwrap();
            col.delete_document(&gone).unwrap();
            col.create_index(crate::index::IndexSpec::single("title", crate::query::Order::Asc)).unwrap();
            (kept, gone)
        };
        let eng = Engine::open(&path).unwrap();
        let col = eng.collection("books").unwrap();
        assert_eq!(col.len(), 1);
        assert_eq!(col.find_document(&kept).unwrap().data, doc! {"title": "Dune", "price": 9.5});
        assert!(col.find_document(&gone).is_none());
        assert_eq!(col.list_indexes().len(), 1);
    }
}
