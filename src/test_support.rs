// Test-only helpers: sample data and temp paths shared by unit and integration tests.
use crate::book::Book;
use crate::errors::DbError;
use crate::types::DocumentId;
use crate::Database;
use std::path::PathBuf;

pub const BOOKS: &str = "books";

fn book(title: &str, author: &str, genre: &str, year: i32, price: f64, in_stock: bool, pages: i32) -> Book {
    Book {
        title: title.to_string(),
        author: author.to_string(),
        genre: genre.to_string(),
        published_year: year,
        price,
        in_stock,
        pages: Some(pages),
        publisher: None,
    }
}

/// Twelve classics in a fixed insertion order.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        book("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true, 336),
        book("1984", "George Orwell", "Dystopian", 1949, 10.99, true, 328),
        book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true, 180),
        book("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.5, false, 311),
        book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true, 310),
        book("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, true, 224),
        book("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true, 432),
        book("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, true, 1178),
        book("Animal Farm", "George Orwell", "Political Satire", 1945, 8.5, false, 112),
        book("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true, 197),
        book("Moby Dick", "Herman Melville", "Adventure", 1851, 12.5, false, 635),
        book("Wuthering Heights", "Emily Brontë", "Gothic Fiction", 1847, 9.99, true, 342),
    ]
}

/// In-memory database with a `books` collection holding [`sample_books`].
///
/// # Errors
/// Propagates insert failures.
pub fn seeded_database() -> Result<(Database, Vec<DocumentId>), DbError> {
    let db = Database::open_in_memory();
    db.create_collection(BOOKS)?;
    let ids = db.insert_many(BOOKS, &sample_books())?;
    Ok((db, ids))
}

/// A fresh temp directory and a database path inside it. Keep the `TempDir` alive for the
/// duration of the test.
///
/// # Errors
/// Returns an error when the temp directory cannot be created.
pub fn temp_db_path(stem: &str) -> std::io::Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(format!("{stem}.db"));
    Ok((dir, path))
}
