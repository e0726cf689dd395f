//! Performance-advisory indexes. An index never changes which documents a query returns; the
//! planner only uses it to narrow the candidate set before the filter is re-checked.

use crate::errors::DbError;
use crate::query::Order;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u128,
}

/// Normalized key component. Variant order mirrors the cross-type ordering used by filters:
/// null, booleans, numbers, strings, then everything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKeyKind {
    Null,
    Bool(bool),
    Num(OrderedFloat<f64>),
    Str(String),
    Other,
}

/// Key component for values that can bound an index scan; `None` for types the planner skips.
#[must_use]
pub fn key_from_bson(v: &Bson) -> Option<IndexKeyKind> {
    match v {
        Bson::Null | Bson::Undefined => Some(IndexKeyKind::Null),
        Bson::Boolean(b) => Some(IndexKeyKind::Bool(*b)),
        Bson::String(s) => Some(IndexKeyKind::Str(s.clone())),
        other => crate::utils::num::bson_as_f64(other).map(|f| IndexKeyKind::Num(OrderedFloat(f))),
    }
}

/// Key component for a stored value: missing fields index as null, unsupported types as `Other`.
fn stored_key(v: Option<&Bson>) -> IndexKeyKind {
    match v {
        None => IndexKeyKind::Null,
        Some(b) => key_from_bson(b).unwrap_or(IndexKeyKind::Other),
    }
}

/// One component of a composite key, ordered according to its declared direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    pub value: IndexKeyKind,
    pub order: Order,
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        let c = self.value.cmp(&other.value);
        match self.order {
            Order::Asc => c,
            Order::Desc => c.reverse(),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type CompositeKey = Vec<KeyPart>;

/// Declared shape of an index: ordered `(field, direction)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, Order)>,
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    #[must_use]
    pub fn single(field: impl Into<String>, order: Order) -> Self {
        Self { keys: vec![(field.into(), order)], name: None }
    }

    #[must_use]
    pub fn compound(keys: Vec<(String, Order)>) -> Self {
        Self { keys, name: None }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or `field_dir` pairs joined by `_` (`author_1_published_year_-1`).
    #[must_use]
    pub fn resolved_name(&self) -> String {
        if let Some(n) = &self.name {
            return n.clone();
        }
        self.keys
            .iter()
            .map(|(f, o)| format!("{f}_{}", o.direction()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|(f, _)| f.as_str())
    }

    /// # Errors
    /// Returns `QueryError` for an empty key list or a repeated field.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.keys.is_empty() {
            return Err(DbError::QueryError("index needs at least one key".into()));
        }
        let mut seen = BTreeSet::new();
        for (f, _) in &self.keys {
            if f.is_empty() {
                return Err(DbError::QueryError("index key must name a field".into()));
            }
            if !seen.insert(f.as_str()) {
                return Err(DbError::QueryError(format!("duplicate index key: {f}")));
            }
        }
        Ok(())
    }

    fn key_for(&self, doc: &BsonDocument) -> CompositeKey {
        self.keys
            .iter()
            .map(|(f, o)| KeyPart { value: stored_key(crate::query::get_path(doc, f)), order: *o })
            .collect()
    }
}

/// Parse `{"title": 1}` / `{"author": 1, "published_year": -1}`; key order is preserved.
///
/// # Errors
/// Returns an error for invalid JSON, a non-object, or directions other than `1`/`-1`.
pub fn parse_index_json(json: &str) -> Result<IndexSpec, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    let obj = val
        .as_object()
        .ok_or_else(|| DbError::QueryError("index spec must be a JSON object".into()))?;
    let mut keys = Vec::with_capacity(obj.len());
    for (field, dir) in obj {
        let d = dir
            .as_i64()
            .ok_or_else(|| DbError::QueryError(format!("index direction for {field} must be 1 or -1")))?;
        keys.push((field.clone(), Order::from_direction(d)?));
    }
    let spec = IndexSpec::compound(keys);
    spec.validate()?;
    Ok(spec)
}

/// Ordered composite-key index.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub spec: IndexSpec,
    pub map: BTreeMap<CompositeKey, BTreeSet<DocumentId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let k = self.spec.key_for(doc);
        let set = self.map.entry(k).or_default();
        if set.insert(id.clone()) {
            self.stats.entries += 1;
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        let k = self.spec.key_for(doc);
        if let Some(set) = self.map.get_mut(&k) {
            if set.remove(id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Scan keys whose leading component lies in `bounds`, walking in index order and stopping
    /// once past the far bound.
    pub fn scan_leading(&mut self, bounds: &KeyBounds) -> ScanResult {
        let order = self.spec.keys.first().map_or(Order::Asc, |(_, o)| *o);
        let start = match order {
            Order::Asc => bounds.lower.as_ref(),
            Order::Desc => bounds.upper.as_ref(),
        };
        let iter: Box<dyn Iterator<Item = (&CompositeKey, &BTreeSet<DocumentId>)>> = match start {
            Some(b) => {
                let from = vec![KeyPart { value: b.value.clone(), order }];
                Box::new(self.map.range(from..))
            }
            None => Box::new(self.map.iter()),
        };
        let mut out = ScanResult::default();
        for (key, ids) in iter {
            let Some(first) = key.first() else { continue };
            out.keys_examined += 1;
            if bounds.past_end(&first.value, order) {
                break;
            }
            if bounds.contains(&first.value) {
                out.ids.extend(ids.iter().cloned());
            }
        }
        if out.ids.is_empty() {
            self.stats.misses += 1;
        } else {
            self.stats.hits += 1;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBound {
    pub value: IndexKeyKind,
    pub inclusive: bool,
}

/// Interval on a single key component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBounds {
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
}

impl KeyBounds {
    #[must_use]
    pub fn exact(v: IndexKeyKind) -> Self {
        Self {
            lower: Some(KeyBound { value: v.clone(), inclusive: true }),
            upper: Some(KeyBound { value: v, inclusive: true }),
        }
    }

    /// Tighten the lower bound; at equal values an exclusive bound wins.
    pub fn raise_lower(&mut self, b: KeyBound) {
        let replace = match &self.lower {
            None => true,
            Some(cur) => b.value > cur.value || (b.value == cur.value && !b.inclusive),
        };
        if replace {
            self.lower = Some(b);
        }
    }

    /// Tighten the upper bound; at equal values an exclusive bound wins.
    pub fn lower_upper(&mut self, b: KeyBound) {
        let replace = match &self.upper {
            None => true,
            Some(cur) => b.value < cur.value || (b.value == cur.value && !b.inclusive),
        };
        if replace {
            self.upper = Some(b);
        }
    }

    /// Keep the interval inside the type class of `v`; range predicates never match across types.
    pub fn clamp_to_class(&mut self, v: &IndexKeyKind) {
        let (lo, hi) = match v {
            IndexKeyKind::Bool(_) => (
                KeyBound { value: IndexKeyKind::Bool(false), inclusive: true },
                KeyBound { value: IndexKeyKind::Bool(true), inclusive: true },
            ),
            IndexKeyKind::Num(_) => (
                KeyBound { value: IndexKeyKind::Num(OrderedFloat(f64::NEG_INFINITY)), inclusive: true },
                KeyBound { value: IndexKeyKind::Num(OrderedFloat(f64::NAN)), inclusive: true },
            ),
            IndexKeyKind::Str(_) => (
                KeyBound { value: IndexKeyKind::Str(String::new()), inclusive: true },
                KeyBound { value: IndexKeyKind::Other, inclusive: false },
            ),
            IndexKeyKind::Null | IndexKeyKind::Other => return,
        };
        self.raise_lower(lo);
        self.lower_upper(hi);
    }

    #[must_use]
    pub fn contains(&self, v: &IndexKeyKind) -> bool {
        let above = self.lower.as_ref().is_none_or(|b| if b.inclusive { v >= &b.value } else { v > &b.value });
        let below = self.upper.as_ref().is_none_or(|b| if b.inclusive { v <= &b.value } else { v < &b.value });
        above && below
    }

    fn past_end(&self, v: &IndexKeyKind, order: Order) -> bool {
        match order {
            Order::Asc => self
                .upper
                .as_ref()
                .is_some_and(|b| if b.inclusive { v > &b.value } else { v >= &b.value }),
            Order::Desc => self
                .lower
                .as_ref()
                .is_some_and(|b| if b.inclusive { v < &b.value } else { v <= &b.value }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub ids: Vec<DocumentId>,
    pub keys_examined: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub keys: Vec<(String, i32)>,
    pub stats: IndexStats,
}

/// All indexes of one collection, keyed by resolved name.
#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: BTreeMap<String, BTreeIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: BTreeMap::new() }
    }

    /// Registers an empty index and returns its name; `None` when the same spec already exists.
    ///
    /// # Errors
    /// Returns `QueryError` for an invalid spec, or when the name is taken by a different spec.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<Option<String>, DbError> {
        spec.validate()?;
        let name = spec.resolved_name();
        if let Some(existing) = self.indexes.get(&name) {
            if existing.spec.keys == spec.keys {
                return Ok(None);
            }
            return Err(DbError::QueryError(format!("index name {name} already in use")));
        }
        self.indexes.insert(name.clone(), BTreeIndex::new(spec));
        Ok(Some(name))
    }

    /// # Errors
    /// Returns `NoSuchIndex` when no index has that name.
    pub fn drop_index(&mut self, name: &str) -> Result<(), DbError> {
        self.indexes.remove(name).map(|_| ()).ok_or_else(|| DbError::NoSuchIndex(name.to_string()))
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.indexes
            .iter()
            .map(|(name, idx)| IndexDescriptor {
                name: name.clone(),
                keys: idx.spec.keys.iter().map(|(f, o)| (f.clone(), o.direction())).collect(),
                stats: idx.stats.clone(),
            })
            .collect()
    }
}

pub fn index_insert_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.insert(doc, id);
    }
}

pub fn index_remove_all(mgr: &mut IndexManager, doc: &BsonDocument, id: &DocumentId) {
    for idx in mgr.indexes.values_mut() {
        idx.remove(doc, id);
    }
}
