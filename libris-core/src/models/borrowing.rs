/// Borrowing model and database operations
///
/// A borrowing links one user to one book for a time-bounded loan. It moves
/// through exactly one transition, `borrowed -> returned`, performed by
/// [`Borrowing::mark_returned`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE borrowings (
///     borrowing_id SERIAL PRIMARY KEY,
///     user_id INTEGER NOT NULL,     -- fk_borrowings_user_id, ON DELETE CASCADE
///     book_id INTEGER NOT NULL,     -- fk_borrowings_book_id, ON DELETE RESTRICT
///     borrow_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     due_date TIMESTAMPTZ NOT NULL,            -- check_due_date (> borrow_date)
///     return_date TIMESTAMPTZ,
///     status VARCHAR(20) NOT NULL DEFAULT 'borrowed',  -- check_borrowing_status
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `check_return_state` ties `status` and `return_date` together: a returned
/// borrowing always has a return date and a borrowed one never does.

use super::UnknownVariant;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use tracing::{debug, info};

/// Borrowing lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    /// Book is out with the user
    Borrowed,

    /// Book has been handed back
    Returned,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Borrowed => "borrowed",
            BorrowingStatus::Returned => "returned",
        }
    }

    /// Active borrowings count toward the per-user limit
    pub fn is_active(&self) -> bool {
        matches!(self, BorrowingStatus::Borrowed)
    }

    pub fn can_transition_to(&self, target: BorrowingStatus) -> bool {
        matches!(
            (self, target),
            (BorrowingStatus::Borrowed, BorrowingStatus::Returned)
        )
    }
}

impl FromStr for BorrowingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(BorrowingStatus::Borrowed),
            "returned" => Ok(BorrowingStatus::Returned),
            other => Err(UnknownVariant::new("borrowing status", other)),
        }
    }
}

impl TryFrom<String> for BorrowingStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Borrowing {
    pub borrowing_id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,

    /// Set when the book is returned
    pub return_date: Option<DateTime<Utc>>,

    #[sqlx(try_from = "String")]
    pub status: BorrowingStatus,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Borrowing {
    /// A borrowing counts as returned if either marker says so
    pub fn is_returned(&self) -> bool {
        self.status == BorrowingStatus::Returned || self.return_date.is_some()
    }

    /// Still out and past its due date at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_returned() && self.due_date < now
    }
}

/// Input for creating a new borrowing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBorrowing {
    pub user_id: i32,
    pub book_id: i32,

    /// Defaults to the database's NOW() when omitted
    pub borrow_date: Option<DateTime<Utc>>,

    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Input for updating loan terms of a borrowing
///
/// Returning a book goes through [`Borrowing::mark_returned`] instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBorrowing {
    /// Extended due date
    pub due_date: Option<DateTime<Utc>>,

    /// New notes (use Some(None) to clear)
    pub notes: Option<Option<String>>,
}

impl Borrowing {
    /// Inserts a borrowing in `borrowed` state
    ///
    /// Does not touch the book's copy counter; `BorrowingService::borrow_book`
    /// pairs the two inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` for an unknown user or book
    /// (`fk_borrowings_user_id`, `fk_borrowings_book_id`) or a due date not
    /// after the borrow date (`check_due_date`).
    pub async fn create<'e, E>(executor: E, data: CreateBorrowing) -> Result<Self>
    where
        E: PgExecutor<'e>,
    {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (user_id, book_id, borrow_date, due_date, status, notes)
            VALUES ($1, $2, COALESCE($3, NOW()), $4, 'borrowed', $5)
            RETURNING borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                      status, notes, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.book_id)
        .bind(data.borrow_date)
        .bind(data.due_date)
        .bind(data.notes)
        .fetch_one(executor)
        .await?;

        info!(
            borrowing_id = borrowing.borrowing_id,
            user_id = borrowing.user_id,
            book_id = borrowing.book_id,
            due_date = %borrowing.due_date,
            "Borrowing created"
        );
        Ok(borrowing)
    }

    pub async fn find_by_id<'e, E>(executor: E, borrowing_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                   status, notes, created_at, updated_at
            FROM borrowings
            WHERE borrowing_id = $1
            "#,
        )
        .bind(borrowing_id)
        .fetch_optional(executor)
        .await?;

        Ok(borrowing)
    }

    /// Finds a borrowing by ID and locks the row until the transaction ends
    ///
    /// Two concurrent returns of the same borrowing serialize here; the second
    /// sees the row already returned.
    pub async fn find_by_id_for_update<'e, E>(executor: E, borrowing_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                   status, notes, created_at, updated_at
            FROM borrowings
            WHERE borrowing_id = $1
            FOR UPDATE
            "#,
        )
        .bind(borrowing_id)
        .fetch_optional(executor)
        .await?;

        Ok(borrowing)
    }

    /// Lists all borrowings of a user, newest first
    pub async fn find_by_user<'e, E>(executor: E, user_id: i32) -> Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowings = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                   status, notes, created_at, updated_at
            FROM borrowings
            WHERE user_id = $1
            ORDER BY borrow_date DESC, borrowing_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(borrowings)
    }

    /// Lists a user's active borrowings, earliest due first
    pub async fn find_active_by_user<'e, E>(executor: E, user_id: i32) -> Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowings = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                   status, notes, created_at, updated_at
            FROM borrowings
            WHERE user_id = $1 AND status = $2
            ORDER BY due_date, borrowing_id
            "#,
        )
        .bind(user_id)
        .bind(BorrowingStatus::Borrowed.as_str())
        .fetch_all(executor)
        .await?;

        Ok(borrowings)
    }

    /// Counts a user's borrowings in `borrowed` state
    pub async fn count_active_by_user<'e, E>(executor: E, user_id: i32) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrowings
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(BorrowingStatus::Borrowed.as_str())
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Lists active borrowings whose due date is before `now`
    pub async fn find_overdue<'e, E>(executor: E, now: DateTime<Utc>) -> Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowings = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                   status, notes, created_at, updated_at
            FROM borrowings
            WHERE status = $1 AND due_date < $2
            ORDER BY due_date, borrowing_id
            "#,
        )
        .bind(BorrowingStatus::Borrowed.as_str())
        .bind(now)
        .fetch_all(executor)
        .await?;

        Ok(borrowings)
    }

    /// Performs the `borrowed -> returned` transition
    ///
    /// The state guard lives in the WHERE clause, so the update is a no-op for
    /// a borrowing that is already returned.
    ///
    /// # Returns
    ///
    /// The updated borrowing, or None if it doesn't exist or was not borrowed
    pub async fn mark_returned<'e, E>(
        executor: E,
        borrowing_id: i32,
        return_date: DateTime<Utc>,
    ) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings
            SET status = 'returned',
                return_date = $2
            WHERE borrowing_id = $1 AND status = 'borrowed' AND return_date IS NULL
            RETURNING borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                      status, notes, created_at, updated_at
            "#,
        )
        .bind(borrowing_id)
        .bind(return_date)
        .fetch_optional(executor)
        .await?;

        debug!(borrowing_id, transitioned = borrowing.is_some(), "Mark returned");
        Ok(borrowing)
    }

    /// Updates loan terms
    ///
    /// Returns None if no borrowing has this ID.
    pub async fn update<'e, E>(
        executor: E,
        borrowing_id: i32,
        data: UpdateBorrowing,
    ) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings
            SET due_date = COALESCE($2, due_date),
                notes = CASE WHEN $3 THEN $4 ELSE notes END
            WHERE borrowing_id = $1
            RETURNING borrowing_id, user_id, book_id, borrow_date, due_date, return_date,
                      status, notes, created_at, updated_at
            "#,
        )
        .bind(borrowing_id)
        .bind(data.due_date)
        .bind(data.notes.is_some())
        .bind(data.notes.flatten())
        .fetch_optional(executor)
        .await?;

        Ok(borrowing)
    }

    /// Deletes a borrowing row
    ///
    /// The service never deletes borrowings; this exists for administrative
    /// cleanup. It does not adjust the book's copy counter.
    pub async fn delete<'e, E>(executor: E, borrowing_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM borrowings WHERE borrowing_id = $1")
            .bind(borrowing_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
