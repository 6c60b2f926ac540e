//! Storage abstraction for mptree node rows.
//!
//! Provides the [`NodeRepository`] trait defining the storage contract the
//! tree algorithms need, plus the [`InMemoryRepository`] and
//! [`SqliteRepository`] as first-class backends.
//!
//! # Architecture
//!
//! Every repository call is atomic on its own. Multi-step mutations are made
//! atomic by running them inside [`NodeRepository::atomic`], which rolls all
//! of their writes back when the closure fails.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: NodeRepository trait, PathRange and DepthFilter
//! - [`memory`]: InMemoryRepository implementation
//! - [`schema`]: SQL schema migrations and connection setup
//! - [`sqlite`]: SqliteRepository implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
pub use traits::{DepthFilter, NodeRepository, PathRange};
