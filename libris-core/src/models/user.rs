/// User model and database operations
///
/// Users are library members and staff. Deleting a user cascades to all of
/// their borrowings.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     user_id SERIAL PRIMARY KEY,
///     username VARCHAR(50) NOT NULL,           -- users_username_unique
///     email VARCHAR(100) NOT NULL,             -- users_email_unique
///     full_name VARCHAR(100) NOT NULL,
///     phone VARCHAR(20),
///     role VARCHAR(20) NOT NULL DEFAULT 'member',    -- check_user_role
///     status VARCHAR(20) NOT NULL DEFAULT 'active',  -- check_user_status
///     registration_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()  -- trg_users_updated_at
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use libris_core::models::user::{User, UpdateUser, UserStatus};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// if let Some(user) = User::find_by_username(&pool, "siti.rahma").await? {
///     User::update(&pool, user.user_id, UpdateUser {
///         status: Some(UserStatus::Inactive),
///         ..Default::default()
///     }).await?;
/// }
/// # Ok(())
/// # }
/// ```

use super::UnknownVariant;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use tracing::{debug, info};

/// Role of a user within the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular borrower
    Member,

    /// Staff managing the catalog and loans
    Librarian,

    /// Full administrative access
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Librarian => "librarian",
            UserRole::Admin => "admin",
        }
    }

    /// Staff roles can manage the catalog
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Librarian | UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "member" => Ok(UserRole::Member),
            "librarian" => Ok(UserRole::Librarian),
            "admin" => Ok(UserRole::Admin),
            other => Err(UnknownVariant::new("user role", other)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Account status; only active users may borrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(UnknownVariant::new("user status", other)),
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// User model representing a library account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub user_id: i32,

    /// Login name, unique across all users
    pub username: String,

    /// Email address, unique across all users
    pub email: String,

    /// Display name
    pub full_name: String,

    /// Optional phone number
    pub phone: Option<String>,

    #[sqlx(try_from = "String")]
    pub role: UserRole,

    #[sqlx(try_from = "String")]
    pub status: UserStatus,

    /// When the account was registered
    pub registration_date: DateTime<Utc>,

    /// Last successful login (None if never logged in)
    pub last_login: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// Refreshed by trigger on every update
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,

    /// Role to assign (defaults to Member)
    #[serde(default = "default_role")]
    pub role: UserRole,

    /// Initial status (defaults to Active)
    #[serde(default = "default_status")]
    pub status: UserStatus,
}

fn default_role() -> UserRole {
    UserRole::Member
}

fn default_status() -> UserStatus {
    UserStatus::Active
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,

    /// New phone number (use Some(None) to clear)
    pub phone: Option<Option<String>>,

    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.phone.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the username or email is already taken
    /// (`users_username_unique`, `users_email_unique`).
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, phone, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING user_id, username, email, full_name, phone, role, status,
                      registration_date, last_login, created_at, updated_at
            "#,
        )
        .bind(data.username)
        .bind(data.email)
        .bind(data.full_name)
        .bind(data.phone)
        .bind(data.role.as_str())
        .bind(data.status.as_str())
        .fetch_one(executor)
        .await?;

        info!(user_id = user.user_id, username = %user.username, "User created");
        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, user_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, full_name, phone, role, status,
                   registration_date, last_login, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID and locks the row until the transaction ends
    ///
    /// Only meaningful inside a transaction. Used to serialize concurrent
    /// borrow calls for the same user.
    pub async fn find_by_id_for_update<'e, E>(executor: E, user_id: i32) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, full_name, phone, role, status,
                   registration_date, last_login, created_at, updated_at
            FROM users
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by username
    pub async fn find_by_username<'e, E>(executor: E, username: &str) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, full_name, phone, role, status,
                   registration_date, last_login, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, full_name, phone, role, status,
                   registration_date, last_login, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. `updated_at` is refreshed by
    /// the `trg_users_updated_at` trigger. An empty update returns the current
    /// row unchanged.
    ///
    /// # Returns
    ///
    /// The updated user, or None if no user has this ID
    pub async fn update<'e, E>(executor: E, user_id: i32, data: UpdateUser) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        if data.is_empty() {
            return Self::find_by_id(executor, user_id).await;
        }

        let mut assignments = Vec::new();
        let mut bind_count = 1;

        if data.username.is_some() {
            bind_count += 1;
            assignments.push(format!("username = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            assignments.push(format!("email = ${}", bind_count));
        }
        if data.full_name.is_some() {
            bind_count += 1;
            assignments.push(format!("full_name = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            assignments.push(format!("phone = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            assignments.push(format!("role = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            assignments.push(format!("status = ${}", bind_count));
        }

        let query = format!(
            "UPDATE users SET {} WHERE user_id = $1 \
             RETURNING user_id, username, email, full_name, phone, role, status, \
             registration_date, last_login, created_at, updated_at",
            assignments.join(", ")
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(user_id);

        if let Some(username) = data.username {
            q = q.bind(username);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(full_name) = data.full_name {
            q = q.bind(full_name);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(role) = data.role {
            q = q.bind(role.as_str());
        }
        if let Some(status) = data.status {
            q = q.bind(status.as_str());
        }

        let user = q.fetch_optional(executor).await?;

        debug!(user_id, updated = user.is_some(), "User update applied");
        Ok(user)
    }

    /// Deletes a user by ID
    ///
    /// All of the user's borrowings are removed by `ON DELETE CASCADE`.
    ///
    /// # Returns
    ///
    /// True if the user was deleted, false if it didn't exist
    pub async fn delete<'e, E>(executor: E, user_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(user_id, "User deleted");
        }
        Ok(deleted)
    }

    /// Records a successful login
    pub async fn update_last_login<'e, E>(executor: E, user_id: i32) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users, newest registrations first
    pub async fn list<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, full_name, phone, role, status,
                   registration_date, last_login, created_at, updated_at
            FROM users
            ORDER BY registration_date DESC, user_id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(users)
    }

    /// Counts total number of users
    pub async fn count<'e, E>(executor: E) -> Result<i64>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
