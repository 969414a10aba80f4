/// Borrowing workflow
///
/// [`BorrowingService`] pairs every copy-counter change with its borrowing
/// row change inside one transaction.
///
/// # Borrow
///
/// 0. Compute the due date (`now + days`); reject lengths past the date range
/// 1. Lock the user row; reject inactive accounts
/// 2. Lock the book row; reject when no copies are available
/// 3. Count the user's active borrowings; reject at the configured limit
/// 4. Decrement `available_copies`
/// 5. Insert the borrowing (`due_date = now + days`)
///
/// Steps 0-3 only read. Steps 4-5 either both commit or both roll back.
///
/// # Return
///
/// 1. Lock the borrowing row; reject if it is already returned
/// 2. Mark it returned
/// 3. Increment the book's `available_copies`
///
/// # Concurrency
///
/// The row locks taken in step 1-2 of a borrow make concurrent borrows of the
/// same book (or by the same user) queue behind each other, so the
/// check-then-decrement cannot overshoot.
///
/// # Example
///
/// ```no_run
/// use libris_core::service::BorrowingService;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let service = BorrowingService::new(pool);
///
/// let borrowing = service.borrow_book(1, 42, 14).await?;
/// service.return_book(borrowing.borrowing_id).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::LibraryConfig;
use crate::error::{LibraryError, Result, StateError};
use crate::models::book::Book;
use crate::models::borrowing::{Borrowing, CreateBorrowing};
use crate::models::user::User;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

/// Orchestrates borrow and return against the users, books and borrowings tables
#[derive(Debug, Clone)]
pub struct BorrowingService {
    pool: PgPool,
    config: LibraryConfig,
}

impl BorrowingService {
    /// Creates a service with the default rules (5 active borrowings, 14-day loans)
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, LibraryConfig::default())
    }

    pub fn with_config(pool: PgPool, config: LibraryConfig) -> Self {
        BorrowingService { pool, config }
    }

    pub fn max_active_borrowings(&self) -> u32 {
        self.config.max_active_borrowings
    }

    /// Lends a book to a user for `days` days
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user or book does not exist
    /// - `State(InactiveAccount)` if the user is not active
    /// - `State(NoCopiesAvailable)` if the book has no copies left
    /// - `State(BorrowLimitReached)` if the user is at the borrow limit
    /// - `State(InvalidLoanDuration)` if `now + days` is not a representable date
    /// - `TransactionFailure` if the decrement or the insert fails; a loan of
    ///   zero days ends here because `check_due_date` rejects the row
    pub async fn borrow_book(&self, user_id: i32, book_id: i32, days: u32) -> Result<Borrowing> {
        let borrow_date = Utc::now();
        let due_date = loan_due_date(borrow_date, days)?;

        let mut tx = self.pool.begin().await?;

        let user = User::find_by_id_for_update(&mut *tx, user_id)
            .await?
            .ok_or_else(|| LibraryError::not_found("User", user_id))?;

        if !user.is_active() {
            warn!(user_id, status = user.status.as_str(), "Borrow rejected: inactive account");
            return Err(StateError::InactiveAccount.into());
        }

        let book = Book::find_by_id_for_update(&mut *tx, book_id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Book", book_id))?;

        if !book.has_available_copies() {
            warn!(book_id, "Borrow rejected: no copies available");
            return Err(StateError::NoCopiesAvailable.into());
        }

        let active = Borrowing::count_active_by_user(&mut *tx, user_id).await?;
        let limit = self.config.max_active_borrowings;

        if active >= i64::from(limit) {
            warn!(user_id, active, limit, "Borrow rejected: borrow limit reached");
            return Err(StateError::BorrowLimitReached { limit }.into());
        }

        let dates = (borrow_date, due_date);
        let borrowing = match Self::apply_borrow(&mut tx, user_id, book_id, dates).await {
            Ok(borrowing) => borrowing,
            Err(err) => {
                Self::rollback(tx, "borrow").await;
                return Err(LibraryError::transaction_failure(err));
            }
        };

        tx.commit()
            .await
            .map_err(|err| LibraryError::transaction_failure(err.into()))?;

        info!(
            borrowing_id = borrowing.borrowing_id,
            user_id,
            book_id,
            days,
            "Book borrowed"
        );
        Ok(borrowing)
    }

    /// Lends a book for the configured default loan length
    pub async fn borrow_book_default(&self, user_id: i32, book_id: i32) -> Result<Borrowing> {
        self.borrow_book(user_id, book_id, self.config.default_loan_days)
            .await
    }

    /// Returns a borrowed book
    ///
    /// # Returns
    ///
    /// `true` once the borrowing is marked returned and the copy is back
    ///
    /// # Errors
    ///
    /// - `NotFound` if the borrowing does not exist
    /// - `State(AlreadyReturned)` on a second return
    /// - `TransactionFailure` if either update fails
    pub async fn return_book(&self, borrowing_id: i32) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let borrowing = Borrowing::find_by_id_for_update(&mut *tx, borrowing_id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Borrowing", borrowing_id))?;

        if borrowing.is_returned() {
            warn!(borrowing_id, "Return rejected: already returned");
            return Err(StateError::AlreadyReturned.into());
        }

        if let Err(err) = Self::apply_return(&mut tx, &borrowing).await {
            Self::rollback(tx, "return").await;
            return Err(LibraryError::transaction_failure(err));
        }

        tx.commit()
            .await
            .map_err(|err| LibraryError::transaction_failure(err.into()))?;

        info!(borrowing_id, book_id = borrowing.book_id, "Book returned");
        Ok(true)
    }

    async fn apply_borrow(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        book_id: i32,
        (borrow_date, due_date): (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Borrowing> {
        if !Book::decrease_available_copies(&mut **tx, book_id).await? {
            return Err(LibraryError::not_found("Book", book_id));
        }

        Borrowing::create(
            &mut **tx,
            CreateBorrowing {
                user_id,
                book_id,
                borrow_date: Some(borrow_date),
                due_date,
                notes: None,
            },
        )
        .await
    }

    async fn apply_return(tx: &mut Transaction<'_, Postgres>, borrowing: &Borrowing) -> Result<()> {
        Borrowing::mark_returned(&mut **tx, borrowing.borrowing_id, Utc::now())
            .await?
            .ok_or(StateError::AlreadyReturned)?;

        if !Book::increase_available_copies(&mut **tx, borrowing.book_id).await? {
            return Err(LibraryError::not_found("Book", borrowing.book_id));
        }

        Ok(())
    }

    async fn rollback(tx: Transaction<'_, Postgres>, operation: &'static str) {
        match tx.rollback().await {
            Ok(()) => warn!(operation, "Transaction rolled back"),
            // Postgres discards the transaction when the connection drops anyway
            Err(err) => warn!(operation, error = %err, "Explicit rollback failed"),
        }
    }
}

/// Due date of a loan of `days` days starting at `borrow_date`
///
/// Fails with `InvalidLoanDuration` instead of overflowing the date range.
pub fn loan_due_date(borrow_date: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|length| borrow_date.checked_add_signed(length))
        .ok_or_else(|| StateError::InvalidLoanDuration { days }.into())
}
