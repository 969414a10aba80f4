/// Error types for the borrowing core
///
/// Every fallible operation in this crate returns [`Result<T>`], which carries a
/// [`LibraryError`]. Errors fall into four groups:
///
/// - **State errors**: a business precondition was not met (inactive account,
///   no copies left, borrow limit reached, already returned, loan too long).
///   They are raised before any write happens.
/// - **Constraint violations**: the database rejected a write (foreign key,
///   unique, not null, check). The violated constraint or column is reported
///   together with the verbatim database message.
/// - **Transaction failures**: something failed after the copy counter was
///   touched but before the borrowing row was written. The transaction has
///   already been rolled back when the caller sees this.
/// - **Not found / database**: missing rows and every other storage error.
///
/// # Example
///
/// ```
/// use libris_core::error::{LibraryError, StateError};
///
/// let err: LibraryError = StateError::BorrowLimitReached { limit: 5 }.into();
/// assert!(err.to_string().contains("batas peminjaman: 5"));
/// assert_eq!(err.state(), Some(&StateError::BorrowLimitReached { limit: 5 }));
/// ```

use sqlx::postgres::PgDatabaseError;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Business precondition failures
///
/// The messages are part of the observable contract and are matched by
/// callers, so they must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The borrowing user is not in `active` status
    #[error("User account tidak active")]
    InactiveAccount,

    /// The book has no available copies left
    #[error("Tidak ada kopi yang tersedia")]
    NoCopiesAvailable,

    /// The user already holds the maximum number of active borrowings
    #[error("Sudah mencapai batas peminjaman: {limit}")]
    BorrowLimitReached { limit: u32 },

    /// The borrowing has already been returned
    #[error("Buku sudah dikembalikan")]
    AlreadyReturned,

    /// The due date for this loan length falls outside the representable range
    #[error("Durasi peminjaman tidak valid: {days} hari")]
    InvalidLoanDuration { days: u32 },
}

/// Kind of storage constraint that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Referenced row missing, or a restricting reference still exists
    ForeignKey,

    /// Duplicate value in a unique column
    Unique,

    /// NULL written into a NOT NULL column
    NotNull,

    /// CHECK predicate evaluated to false
    Check,
}

impl ConstraintKind {
    /// Maps a PostgreSQL SQLSTATE code to a constraint kind
    ///
    /// Only the integrity-constraint codes of class 23 are recognised.
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "23503" => Some(ConstraintKind::ForeignKey),
            "23505" => Some(ConstraintKind::Unique),
            "23502" => Some(ConstraintKind::NotNull),
            "23514" => Some(ConstraintKind::Check),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for DAOs and the borrowing service
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Business precondition not met; nothing was written
    #[error(transparent)]
    State(#[from] StateError),

    /// Write rejected by a storage constraint
    #[error("{kind} constraint violation on {rule}: {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        /// Constraint name, or the column name for NOT NULL violations
        rule: String,
        /// Database message, unmodified
        message: String,
    },

    /// Failure inside the mutation phase of a service call; rolled back
    #[error("Transaction rolled back: {source}")]
    TransactionFailure {
        #[source]
        source: Box<LibraryError>,
    },

    /// Referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i32 },

    /// Any other storage error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl LibraryError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        LibraryError::NotFound { entity, id }
    }

    /// Wraps an error raised between the copy-count update and the borrowing write
    pub fn transaction_failure(source: LibraryError) -> Self {
        LibraryError::TransactionFailure {
            source: Box::new(source),
        }
    }

    /// Returns the state error, if this is one
    pub fn state(&self) -> Option<&StateError> {
        match self {
            LibraryError::State(state) => Some(state),
            _ => None,
        }
    }

    /// Returns the kind of the violated constraint
    ///
    /// Looks through `TransactionFailure` so callers see the underlying cause.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            LibraryError::ConstraintViolation { kind, .. } => Some(*kind),
            LibraryError::TransactionFailure { source } => source.constraint_kind(),
            _ => None,
        }
    }

    /// Returns the violated constraint or column name
    pub fn violated_rule(&self) -> Option<&str> {
        match self {
            LibraryError::ConstraintViolation { rule, .. } => Some(rule.as_str()),
            LibraryError::TransactionFailure { source } => source.violated_rule(),
            _ => None,
        }
    }

    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, LibraryError::TransactionFailure { .. })
    }
}

/// Classifies sqlx errors, turning integrity violations into `ConstraintViolation`
impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match err {
            sqlx::Error::Database(db_err) => db_err,
            other => return LibraryError::Database(other),
        };

        let kind = db_err
            .code()
            .and_then(|code| ConstraintKind::from_sqlstate(&code));

        match kind {
            Some(kind) => {
                // Postgres reports no constraint name for NOT NULL, only the column
                let rule = db_err
                    .constraint()
                    .map(str::to_owned)
                    .or_else(|| {
                        db_err
                            .try_downcast_ref::<PgDatabaseError>()
                            .and_then(|pg| pg.column())
                            .map(str::to_owned)
                    })
                    .unwrap_or_else(|| "unknown".to_string());

                LibraryError::ConstraintViolation {
                    kind,
                    rule,
                    message: db_err.message().to_string(),
                }
            }
            None => LibraryError::Database(sqlx::Error::Database(db_err)),
        }
    }
}
