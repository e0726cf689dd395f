pub mod aggregate;
pub mod book;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod import;
pub mod index;
pub mod logger;
pub mod query;
pub mod types;
pub mod utils;
pub mod wal;

#[doc(hidden)]
pub mod test_support;

use crate::aggregate::Pipeline;
use crate::book::Book;
use crate::collection::Collection;
use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::import::{ImportOptions, ImportReport};
use crate::index::{IndexDescriptor, IndexSpec};
use crate::query::{Cursor, DeleteReport, ExplainReport, Filter, FindOptions, UpdateDoc, UpdateReport};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Database name used when a path gives none.
pub const DEFAULT_DB_NAME: &str = "plp_bookstore";

/// The main database struct.
#[derive(Debug)]
pub struct Database {
    name: String,
    engine: Arc<Engine>,
}

impl Database {
    /// Opens or creates a database file and its associated WAL.
    ///
    /// The marker is stored at `{filepath}` and the operation log at `{stem}.wal` beside it.
    /// Logging is initialized under `{dir}/{name}_logs/` unless a logger is already installed.
    ///
    /// # Errors
    /// Returns an error when the files cannot be created or the WAL cannot be replayed.
    pub fn open<P: AsRef<Path>>(filepath: P) -> Result<Self, DbError> {
        let db_path = filepath.as_ref();
        let name = db_path.file_stem().and_then(|s| s.to_str()).unwrap_or(DEFAULT_DB_NAME).to_string();
        let base = db_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        if std::fs::create_dir_all(base).is_ok() {
            let _ = crate::logger::init_for_db_in(base, &name);
        }
        let engine = Engine::open(db_path)?;
        Ok(Self { name, engine: Arc::new(engine) })
    }

    /// A database with no file backing.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self { name: DEFAULT_DB_NAME.to_string(), engine: Arc::new(Engine::in_memory()) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// # Errors
    /// Returns `CollectionAlreadyExists` when `name` is taken.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.create_collection(name)
    }

    /// # Errors
    /// Returns a WAL error when the collection has to be created and logging it fails.
    pub fn ensure_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.ensure_collection(name)
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    /// # Errors
    /// Returns `NoSuchCollection` when `name` does not exist.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.collection(name)
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    /// Validates and inserts a book.
    ///
    /// # Errors
    /// Returns `InvalidBook`, `NoSuchCollection` or a WAL error.
    pub fn insert_book(&self, collection_name: &str, book: &Book) -> Result<DocumentId, DbError> {
        book.validate()?;
        self.insert_document(collection_name, book.to_document())
    }

    /// Inserts a schema-less document. A caller-supplied `_id` is replaced by a store id.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` or a WAL error.
    pub fn insert_document(&self, collection_name: &str, data: BsonDocument) -> Result<DocumentId, DbError> {
        self.collection(collection_name)?.insert_document(Document::new(data))
    }

    /// Every book is validated before any is inserted.
    ///
    /// # Errors
    /// See [`Database::insert_book`].
    pub fn insert_many(&self, collection_name: &str, books: &[Book]) -> Result<Vec<DocumentId>, DbError> {
        for b in books {
            b.validate()?;
        }
        let col = self.collection(collection_name)?;
        books.iter().map(|b| col.insert_document(Document::new(b.to_document()))).collect()
    }

    // --- Query API (façade over query module) ---

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn find(&self, collection_name: &str, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError> {
        Ok(query::find_docs(self.collection(collection_name)?.as_ref(), filter, opts))
    }

    /// The stored document in output form (`_id` first).
    ///
    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn find_by_id(&self, collection_name: &str, id: &DocumentId) -> Result<Option<BsonDocument>, DbError> {
        Ok(self.collection(collection_name)?.find_document(id).map(|d| d.to_output()))
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn count(&self, collection_name: &str, filter: &Filter) -> Result<usize, DbError> {
        Ok(query::count_docs(self.collection(collection_name)?.as_ref(), filter))
    }

    /// # Errors
    /// Returns `NoSuchCollection`, `QueryError` for an invalid update, or a WAL error.
    pub fn update_one(
        &self,
        collection_name: &str,
        filter: &Filter,
        update: &UpdateDoc,
    ) -> Result<UpdateReport, DbError> {
        query::update_one(self.collection(collection_name)?.as_ref(), filter, update)
    }

    /// # Errors
    /// Returns `NoSuchCollection` or a WAL error.
    pub fn delete_one(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        query::delete_one(self.collection(collection_name)?.as_ref(), filter)
    }

    /// # Errors
    /// Returns `NoSuchCollection` or an expression error.
    pub fn aggregate(&self, collection_name: &str, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
        aggregate::run_pipeline(self.collection(collection_name)?.as_ref(), pipeline)
    }

    /// # Errors
    /// Returns `NoSuchCollection`, `QueryError` for a bad spec, or a WAL error.
    pub fn create_index(&self, collection_name: &str, spec: IndexSpec) -> Result<String, DbError> {
        self.collection(collection_name)?.create_index(spec)
    }

    /// # Errors
    /// Returns `NoSuchCollection`, `NoSuchIndex`, or a WAL error.
    pub fn drop_index(&self, collection_name: &str, name: &str) -> Result<(), DbError> {
        self.collection(collection_name)?.drop_index(name)
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn list_indexes(&self, collection_name: &str) -> Result<Vec<IndexDescriptor>, DbError> {
        Ok(self.collection(collection_name)?.list_indexes())
    }

    /// # Errors
    /// Returns `NoSuchCollection`.
    pub fn explain(&self, collection_name: &str, filter: &Filter, opts: &FindOptions) -> Result<ExplainReport, DbError> {
        Ok(query::explain(self.collection(collection_name)?.as_ref(), filter, opts))
    }

    /// Imports books into `collection_name`, creating it when missing.
    ///
    /// # Errors
    /// See [`import::import_books`].
    pub fn import<R: Read>(
        &self,
        collection_name: &str,
        reader: R,
        opts: &ImportOptions,
    ) -> Result<ImportReport, DbError> {
        import::import_books(self.ensure_collection(collection_name)?.as_ref(), reader, opts)
    }

    /// # Errors
    /// See [`import::import_file`].
    pub fn import_file<P: AsRef<Path>>(
        &self,
        collection_name: &str,
        path: P,
        opts: &ImportOptions,
    ) -> Result<ImportReport, DbError> {
        import::import_file(self.ensure_collection(collection_name)?.as_ref(), path, opts)
    }
}
