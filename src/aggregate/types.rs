use crate::query::{Filter, SortSpec};
use bson::Bson;

/// Aggregation expression: a field reference (`"$price"`), a literal, or an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Bson),
    Divide(Box<Expr>, Box<Expr>),
    Multiply(Vec<Expr>),
    Floor(Box<Expr>),
    ToString(Box<Expr>),
    Concat(Vec<Expr>),
    /// `{ "a": <expr>, ... }`, e.g. a compound group key.
    Object(Vec<(String, Expr)>),
}

impl Expr {
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    #[must_use]
    pub fn lit(v: impl Into<Bson>) -> Self {
        Self::Literal(v.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectItem {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Match(Filter),
    Project(Vec<(String, ProjectItem)>),
    Group { id: Expr, fields: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
}

impl PipelineStage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Project(_) => "$project",
            Self::Group { .. } => "$group",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<PipelineStage>,
}

impl Pipeline {
    #[must_use]
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }
}
