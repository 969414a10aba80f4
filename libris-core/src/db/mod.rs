/// Database layer for Libris
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded schema migrations and status reporting
///
/// Table-level operations live in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
