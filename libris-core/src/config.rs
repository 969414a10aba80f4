/// Configuration management
///
/// Configuration is loaded from environment variables (and a `.env` file when
/// present) into a type-safe struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `LIBRARY_MAX_ACTIVE_BORROWINGS`: Concurrent loans per user (default: 5)
/// - `LIBRARY_DEFAULT_LOAN_DAYS`: Loan length used when none is given (default: 14)
/// - `RUST_LOG`: Log filter (default: info)
///
/// # Example
///
/// ```no_run
/// use libris_core::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Borrow limit: {}", config.library.max_active_borrowings);
/// # Ok(())
/// # }
/// ```

use crate::db::pool::DatabaseConfig;
use std::env;

/// Default number of concurrent active borrowings per user
pub const DEFAULT_MAX_ACTIVE_BORROWINGS: u32 = 5;

/// Default loan length in days
pub const DEFAULT_LOAN_DAYS: u32 = 14;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database pool configuration
    pub database: DatabaseConfig,

    /// Borrowing rules
    pub library: LibraryConfig,
}

/// Borrowing rules applied by the service layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Maximum number of borrowings a user may hold at once
    pub max_active_borrowings: u32,

    /// Loan length used by `BorrowingService::borrow_book_default`
    pub default_loan_days: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_active_borrowings: DEFAULT_MAX_ACTIVE_BORROWINGS,
            default_loan_days: DEFAULT_LOAN_DAYS,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric variable
    /// cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()?;

        let max_active_borrowings = lookup("LIBRARY_MAX_ACTIVE_BORROWINGS")
            .map(|v| v.parse::<u32>())
            .transpose()?
            .unwrap_or(DEFAULT_MAX_ACTIVE_BORROWINGS);

        let default_loan_days = lookup("LIBRARY_DEFAULT_LOAN_DAYS")
            .map(|v| v.parse::<u32>())
            .transpose()?
            .unwrap_or(DEFAULT_LOAN_DAYS);

        if max_active_borrowings == 0 {
            anyhow::bail!("LIBRARY_MAX_ACTIVE_BORROWINGS must be at least 1");
        }

        if default_loan_days == 0 {
            anyhow::bail!("LIBRARY_DEFAULT_LOAN_DAYS must be at least 1");
        }

        Ok(Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                ..Default::default()
            },
            library: LibraryConfig {
                max_active_borrowings,
                default_loan_days,
            },
        })
    }
}
