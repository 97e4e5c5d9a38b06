//! # storage-adapters
//!
//! Implementations of the `PostRepository` and `CaptchaRepository` ports.
//! `MemoryStore` is always compiled; the SQLite store sits behind `db-sqlite`.

pub mod error;
pub mod memory;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use error::StorageError;
pub use memory::MemoryStore;
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
