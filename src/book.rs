//! The fixed-shape book record. Storage stays schema-less; this type is the validated boundary
//! for inserts and imports.

use crate::utils::num::{bson_as_f64, bson_as_i64};
use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PUBLISHED_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} must be {expected}")]
    WrongType { field: &'static str, expected: &'static str },

    #[error("field {0} must not be empty")]
    EmptyField(&'static str),

    #[error("published_year out of range: {0}")]
    YearOutOfRange(i64),

    #[error("price must be a finite non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("pages must be positive, got {0}")]
    InvalidPages(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

impl Book {
    /// # Errors
    /// Returns a `BookError` when any field violates the record rules.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
        published_year: i32,
        price: f64,
        in_stock: bool,
    ) -> Result<Self, BookError> {
        let book = Self {
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
            published_year,
            price,
            in_stock,
            pages: None,
            publisher: None,
        };
        book.validate()?;
        Ok(book)
    }

    /// # Errors
    /// Returns `InvalidPages` for a non-positive page count.
    pub fn with_pages(mut self, pages: i32) -> Result<Self, BookError> {
        if pages <= 0 {
            return Err(BookError::InvalidPages(i64::from(pages)));
        }
        self.pages = Some(pages);
        Ok(self)
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    /// Checks every record rule. Deserialized books must pass through here before insertion.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), BookError> {
        if self.title.trim().is_empty() {
            return Err(BookError::EmptyField("title"));
        }
        if self.author.trim().is_empty() {
            return Err(BookError::EmptyField("author"));
        }
        if self.genre.trim().is_empty() {
            return Err(BookError::EmptyField("genre"));
        }
        if !(0..=MAX_PUBLISHED_YEAR).contains(&self.published_year) {
            return Err(BookError::YearOutOfRange(i64::from(self.published_year)));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(BookError::InvalidPrice(self.price));
        }
        if let Some(p) = self.pages
            && p <= 0
        {
            return Err(BookError::InvalidPages(i64::from(p)));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        let mut d = doc! {
            "title": self.title.clone(),
            "author": self.author.clone(),
            "genre": self.genre.clone(),
            "published_year": self.published_year,
            "price": self.price,
            "in_stock": self.in_stock,
        };
        if let Some(p) = self.pages {
            d.insert("pages", p);
        }
        if let Some(p) = &self.publisher {
            d.insert("publisher", p.clone());
        }
        d
    }
}

fn required<'a>(doc: &'a BsonDocument, field: &'static str) -> Result<&'a Bson, BookError> {
    doc.get(field).ok_or(BookError::MissingField(field))
}

fn required_str(doc: &BsonDocument, field: &'static str) -> Result<String, BookError> {
    match required(doc, field)? {
        Bson::String(s) => Ok(s.clone()),
        _ => Err(BookError::WrongType { field, expected: "a string" }),
    }
}

impl TryFrom<&BsonDocument> for Book {
    type Error = BookError;

    fn try_from(doc: &BsonDocument) -> Result<Self, Self::Error> {
        let year = bson_as_i64(required(doc, "published_year")?)
            .ok_or(BookError::WrongType { field: "published_year", expected: "an integer" })?;
        let published_year = i32::try_from(year).map_err(|_| BookError::YearOutOfRange(year))?;
        let price = bson_as_f64(required(doc, "price")?)
            .ok_or(BookError::WrongType { field: "price", expected: "a number" })?;
        let in_stock = match required(doc, "in_stock")? {
            Bson::Boolean(b) => *b,
            _ => return Err(BookError::WrongType { field: "in_stock", expected: "a boolean" }),
        };
        let pages = match doc.get("pages") {
            None | Some(Bson::Null) => None,
            Some(v) => {
                let p = bson_as_i64(v)
                    .ok_or(BookError::WrongType { field: "pages", expected: "an integer" })?;
                Some(i32::try_from(p).map_err(|_| BookError::InvalidPages(p))?)
            }
        };
        let publisher = match doc.get("publisher") {
            None | Some(Bson::Null) => None,
            Some(Bson::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(BookError::WrongType { field: "publisher", expected: "a string" });
            }
        };
        let book = Self {
            title: required_str(doc, "title")?,
            author: required_str(doc, "author")?,
            genre: required_str(doc, "genre")?,
            published_year,
            price,
            in_stock,
            pages,
            publisher,
        };
        book.validate()?;
        Ok(book)
    }
}

impl From<&Book> for BsonDocument {
    fn from(book: &Book) -> Self {
        book.to_document()
    }
}
