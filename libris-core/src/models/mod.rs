/// Database models for Libris
///
/// Each model owns the CRUD operations for its table. Every operation is
/// generic over [`sqlx::PgExecutor`], so it runs equally against a pool or
/// inside an open transaction (`&mut *tx`).
///
/// # Models
///
/// - `user`: Library members and staff
/// - `book`: Catalog entries with copy counters
/// - `borrowing`: Loans linking a user to a book
///
/// # Example
///
/// ```no_run
/// use libris_core::models::user::{CreateUser, User, UserRole, UserStatus};
/// use libris_core::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "siti.rahma".to_string(),
///     email: "siti.rahma@example.com".to_string(),
///     full_name: "Siti Rahma".to_string(),
///     phone: None,
///     role: UserRole::Member,
///     status: UserStatus::Active,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod book;
pub mod borrowing;
pub mod user;

/// A stored string did not match any variant of a closed enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
