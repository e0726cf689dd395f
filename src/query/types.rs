use crate::errors::DbError;
use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Map the shell-style direction (`1` / `-1`).
    ///
    /// # Errors
    /// Returns `QueryError` for any other number.
    pub fn from_direction(d: i64) -> Result<Self, DbError> {
        match d {
            1 => Ok(Self::Asc),
            -1 => Ok(Self::Desc),
            other => Err(DbError::QueryError(format!("sort direction must be 1 or -1, got {other}"))),
        }
    }

    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

/// Field selection applied to result documents. `_id` is kept by an inclusion projection unless
/// `include_id` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include { fields: Vec<String>, include_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    #[must_use]
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include { fields: fields.into_iter().map(Into::into).collect(), include_id: true }
    }

    #[must_use]
    pub fn without_id(self) -> Self {
        match self {
            Self::Include { fields, .. } => Self::Include { fields, include_id: false },
            Self::Exclude(mut fields) => {
                if !fields.iter().any(|f| f == crate::document::ID_FIELD) {
                    fields.push(crate::document::ID_FIELD.to_string());
                }
                Self::Exclude(fields)
            }
        }
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl FindOptions {
    /// Page `page_index` (zero-based) of `page_size` documents: `skip = page_index * page_size`.
    #[must_use]
    pub fn page(page_index: usize, page_size: usize) -> Self {
        Self {
            skip: Some(page_index.saturating_mul(page_size)),
            limit: Some(page_size),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sorted_by(mut self, spec: SortSpec) -> Self {
        self.sort.get_or_insert_with(Vec::new).push(spec);
        self
    }

    #[must_use]
    pub fn projected(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    fn cmp(path: impl Into<String>, op: CmpOp, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op, value: value.into() }
    }

    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Eq, value)
    }

    #[must_use]
    pub fn gt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Gt, value)
    }

    #[must_use]
    pub fn gte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Gte, value)
    }

    #[must_use]
    pub fn lt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Lt, value)
    }

    #[must_use]
    pub fn lte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(path, CmpOp::Lte, value)
    }

    /// Conjunction; flattens to the single member or `True` when possible.
    #[must_use]
    pub fn all(mut filters: Vec<Filter>) -> Self {
        match filters.len() {
            0 => Self::True,
            1 => filters.remove(0),
            _ => Self::And(filters),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, f64)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    #[must_use]
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { set: vec![(field.into(), value.into())], ..Self::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.unset.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: u64,
}
