//! # Libris Core
//!
//! Data layer and borrowing workflow for a small library: users borrow and
//! return books, with the invariants split between the PostgreSQL schema
//! (foreign keys, checks, uniqueness, triggers) and [`service::BorrowingService`].
//!
//! ## Module Organization
//!
//! - `config`: Environment-driven configuration
//! - `db`: Connection pool and embedded migrations
//! - `error`: Error taxonomy (state errors, constraint violations, transaction failures)
//! - `models`: User, Book and Borrowing records with their table operations
//! - `service`: Transactional borrow/return workflow

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use error::{LibraryError, Result};

/// Current version of the Libris core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
