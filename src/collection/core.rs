use crate::document::Document;
use crate::errors::DbError;
use crate::index::IndexManager;
use crate::types::DocumentId;
use crate::wal::{Wal, WalOp};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Documents keyed by insertion sequence. Iterating `by_seq` yields insertion order, which is
/// the tie-break for unsorted results and single-document mutations.
#[derive(Debug, Default)]
pub(crate) struct DocStore {
    pub(crate) by_seq: BTreeMap<u64, Document>,
    pub(crate) seq_of: HashMap<DocumentId, u64>,
    next_seq: u64,
}

impl DocStore {
    /// Appends `doc`; an existing document with the same id keeps its position and is replaced.
    pub(crate) fn push(&mut self, doc: Document) -> u64 {
        if let Some(&seq) = self.seq_of.get(&doc.id) {
            self.by_seq.insert(seq, doc);
            return seq;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(doc.id.clone(), seq);
        self.by_seq.insert(seq, doc);
        seq
    }

    pub(crate) fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.seq_of.get(id).and_then(|s| self.by_seq.get(s))
    }

    pub(crate) fn get_mut(&mut self, id: &DocumentId) -> Option<&mut Document> {
        let seq = *self.seq_of.get(id)?;
        self.by_seq.get_mut(&seq)
    }

    pub(crate) fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let seq = self.seq_of.remove(id)?;
        self.by_seq.remove(&seq)
    }
}

pub struct Collection {
    name: String,
    pub(crate) docs: RwLock<DocStore>,
    pub indexes: RwLock<IndexManager>,
    pub(crate) wal: Option<Arc<Mutex<Wal>>>,
    pub(crate) build_lock: RwLock<()>,
}

impl Collection {
    /// A collection without a WAL keeps its state in memory only.
    #[must_use]
    pub fn new(name: impl Into<String>, wal: Option<Arc<Mutex<Wal>>>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(DocStore::default()),
            indexes: RwLock::new(IndexManager::new()),
            wal,
            build_lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn name_str(&self) -> &str {
        &self.name
    }

    pub(crate) fn log_op(&self, op: WalOp) -> Result<(), DbError> {
        if let Some(wal) = &self.wal {
            wal.lock().append(op)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("documents", &self.docs.read().by_seq.len())
            .field("durable", &self.wal.is_some())
            .finish_non_exhaustive()
    }
}
