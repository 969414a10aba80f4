/// Book model and database operations
///
/// A book row is a catalog entry plus two copy counters. The schema keeps
/// `0 <= available_copies <= total_copies` (`check_available_copies`); the
/// borrowing service moves `available_copies` by exactly one per borrow or
/// return. Books cannot be deleted while borrowings reference them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE books (
///     book_id SERIAL PRIMARY KEY,
///     isbn VARCHAR(20) NOT NULL,               -- books_isbn_unique
///     title VARCHAR(255) NOT NULL,
///     author_id INTEGER REFERENCES authors,
///     publisher_id INTEGER REFERENCES publishers,
///     category_id INTEGER REFERENCES categories,
///     publication_year INTEGER,                -- check_publication_year (>= 1000)
///     pages INTEGER,
///     language VARCHAR(50),
///     description TEXT,
///     total_copies INTEGER NOT NULL DEFAULT 1,
///     available_copies INTEGER NOT NULL DEFAULT 1,  -- check_available_copies
///     price_cents BIGINT NOT NULL DEFAULT 0,
///     location VARCHAR(100),
///     status VARCHAR(20) NOT NULL DEFAULT 'available',  -- check_book_status
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use super::UnknownVariant;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use tracing::{debug, info};

/// Catalog status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// On the shelf and lendable
    Available,

    /// Withdrawn from lending
    Unavailable,

    /// Temporarily out for repair or processing
    Maintenance,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Unavailable => "unavailable",
            BookStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for BookStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "unavailable" => Ok(BookStatus::Unavailable),
            "maintenance" => Ok(BookStatus::Maintenance),
            other => Err(UnknownVariant::new("book status", other)),
        }
    }
}

impl TryFrom<String> for BookStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub book_id: i32,
    pub isbn: String,
    pub title: String,
    pub author_id: Option<i32>,
    pub publisher_id: Option<i32>,
    pub category_id: Option<i32>,
    pub publication_year: Option<i32>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,

    /// Price in minor currency units (e.g. 99000.00 IDR = 9_900_000)
    pub price_cents: i64,

    /// Shelf location
    pub location: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: BookStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn has_available_copies(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently out on loan
    pub fn borrowed_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

/// Input for creating a new book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBook {
    pub isbn: String,
    pub title: String,
    pub author_id: Option<i32>,
    pub publisher_id: Option<i32>,
    pub category_id: Option<i32>,
    pub publication_year: Option<i32>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub total_copies: i32,

    /// Defaults to `total_copies` when omitted
    pub available_copies: Option<i32>,

    #[serde(default)]
    pub price_cents: i64,

    pub location: Option<String>,

    #[serde(default = "default_status")]
    pub status: BookStatus,
}

fn default_status() -> BookStatus {
    BookStatus::Available
}

/// Input for updating catalog fields of a book
///
/// Copy counters are changed through the dedicated operations below, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub publication_year: Option<Option<i32>>,
    pub pages: Option<Option<i32>>,
    pub language: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub total_copies: Option<i32>,
    pub price_cents: Option<i64>,
    pub location: Option<Option<String>>,
    pub status: Option<BookStatus>,
}

impl UpdateBook {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.publication_year.is_none()
            && self.pages.is_none()
            && self.language.is_none()
            && self.description.is_none()
            && self.total_copies.is_none()
            && self.price_cents.is_none()
            && self.location.is_none()
            && self.status.is_none()
    }
}

impl Book {
    /// Creates a new book
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` on a duplicate ISBN, a publication year
    /// below 1000, more available than total copies, or an unknown author,
    /// publisher or category.
    pub async fn create<'e, E>(executor: E, data: CreateBook) -> Result<Self>
    where
        E: PgExecutor<'e>,
    {
        let available_copies = data.available_copies.unwrap_or(data.total_copies);

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (isbn, title, author_id, publisher_id, category_id,
                               publication_year, pages, language, description,
                               total_copies, available_copies, price_cents, location, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING book_id, isbn, title, author_id, publisher_id, category_id,
                      publication_year, pages, language, description, total_copies,
                      available_copies, price_cents, location, status, created_at, updated_at
            "#,
        )
        .bind(data.isbn)
        .bind(data.title)
        .bind(data.author_id)
        .bind(data.publisher_id)
        .bind(data.category_id)
        .bind(data.publication_year)
        .bind(data.pages)
        .bind(data.language)
        .bind(data.description)
        .bind(data.total_copies)
        .bind(available_copies)
        .bind(data.price_cents)
        .bind(data.location)
        .bind(data.status.as_str())
        .fetch_one(executor)
        .await?;

        info!(book_id = book.book_id, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    pub async fn find_by_id<'e, E>(executor: E, book_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT book_id, isbn, title, author_id, publisher_id, category_id,
                   publication_year, pages, language, description, total_copies,
                   available_copies, price_cents, location, status, created_at, updated_at
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id)
        .fetch_optional(executor)
        .await?;

        Ok(book)
    }

    /// Finds a book by ID and locks the row until the transaction ends
    ///
    /// Concurrent borrowers of the same book queue here, so the availability
    /// check and the decrement see the same counter.
    pub async fn find_by_id_for_update<'e, E>(executor: E, book_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT book_id, isbn, title, author_id, publisher_id, category_id,
                   publication_year, pages, language, description, total_copies,
                   available_copies, price_cents, location, status, created_at, updated_at
            FROM books
            WHERE book_id = $1
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .fetch_optional(executor)
        .await?;

        Ok(book)
    }

    pub async fn find_by_isbn<'e, E>(executor: E, isbn: &str) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT book_id, isbn, title, author_id, publisher_id, category_id,
                   publication_year, pages, language, description, total_copies,
                   available_copies, price_cents, location, status, created_at, updated_at
            FROM books
            WHERE isbn = $1
            "#,
        )
        .bind(isbn)
        .fetch_optional(executor)
        .await?;

        Ok(book)
    }

    /// Updates catalog fields of a book
    ///
    /// Only non-None fields are written. Returns None if no book has this ID.
    pub async fn update<'e, E>(executor: E, book_id: i32, data: UpdateBook) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        if data.is_empty() {
            return Self::find_by_id(executor, book_id).await;
        }

        let mut assignments = Vec::new();
        let mut bind_count = 1;

        let mut push = |column: &str| {
            bind_count += 1;
            assignments.push(format!("{} = ${}", column, bind_count));
        };

        if data.title.is_some() {
            push("title");
        }
        if data.publication_year.is_some() {
            push("publication_year");
        }
        if data.pages.is_some() {
            push("pages");
        }
        if data.language.is_some() {
            push("language");
        }
        if data.description.is_some() {
            push("description");
        }
        if data.total_copies.is_some() {
            push("total_copies");
        }
        if data.price_cents.is_some() {
            push("price_cents");
        }
        if data.location.is_some() {
            push("location");
        }
        if data.status.is_some() {
            push("status");
        }

        let query = format!(
            "UPDATE books SET {} WHERE book_id = $1 \
             RETURNING book_id, isbn, title, author_id, publisher_id, category_id, \
             publication_year, pages, language, description, total_copies, \
             available_copies, price_cents, location, status, created_at, updated_at",
            assignments.join(", ")
        );

        let mut q = sqlx::query_as::<_, Book>(&query).bind(book_id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(publication_year) = data.publication_year {
            q = q.bind(publication_year);
        }
        if let Some(pages) = data.pages {
            q = q.bind(pages);
        }
        if let Some(language) = data.language {
            q = q.bind(language);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(total_copies) = data.total_copies {
            q = q.bind(total_copies);
        }
        if let Some(price_cents) = data.price_cents {
            q = q.bind(price_cents);
        }
        if let Some(location) = data.location {
            q = q.bind(location);
        }
        if let Some(status) = data.status {
            q = q.bind(status.as_str());
        }

        let book = q.fetch_optional(executor).await?;

        debug!(book_id, updated = book.is_some(), "Book update applied");
        Ok(book)
    }

    /// Deletes a book by ID
    ///
    /// # Errors
    ///
    /// Returns a foreign-key `ConstraintViolation` (`fk_borrowings_book_id`)
    /// while any borrowing references the book.
    pub async fn delete<'e, E>(executor: E, book_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM books WHERE book_id = $1")
            .bind(book_id)
            .execute(executor)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(book_id, "Book deleted");
        }
        Ok(deleted)
    }

    /// Takes one copy off the shelf
    ///
    /// Returns false if the book does not exist. Going below zero is rejected
    /// by `check_available_copies`.
    pub async fn decrease_available_copies<'e, E>(executor: E, book_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE book_id = $1
            "#,
        )
        .bind(book_id)
        .execute(executor)
        .await?;

        debug!(book_id, "Available copies decreased");
        Ok(result.rows_affected() > 0)
    }

    /// Puts one copy back on the shelf
    ///
    /// Returns false if the book does not exist. Exceeding `total_copies` is
    /// rejected by `check_available_copies`.
    pub async fn increase_available_copies<'e, E>(executor: E, book_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1
            WHERE book_id = $1
            "#,
        )
        .bind(book_id)
        .execute(executor)
        .await?;

        debug!(book_id, "Available copies increased");
        Ok(result.rows_affected() > 0)
    }

    /// Sets the available copy count directly (stock corrections)
    pub async fn update_available_copies<'e, E>(
        executor: E,
        book_id: i32,
        available_copies: i32,
    ) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = $2
            WHERE book_id = $1
            "#,
        )
        .bind(book_id)
        .bind(available_copies)
        .execute(executor)
        .await?;

        info!(book_id, available_copies, "Available copies set");
        Ok(result.rows_affected() > 0)
    }

    /// Lists lendable books (status available, at least one copy), by title
    pub async fn list_available<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT book_id, isbn, title, author_id, publisher_id, category_id,
                   publication_year, pages, language, description, total_copies,
                   available_copies, price_cents, location, status, created_at, updated_at
            FROM books
            WHERE status = 'available' AND available_copies > 0
            ORDER BY title, book_id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(books)
    }

    pub async fn count<'e, E>(executor: E) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
