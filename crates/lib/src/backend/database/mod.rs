//! Database-style backend implementations
//!
//! - [`InMemory`]: maps behind async locks, with JSON file persistence
//! - [`SqlxBackend`]: SQLite / PostgreSQL through sqlx (features `sqlite`, `postgres`)

mod in_memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use in_memory::InMemory;
#[cfg(feature = "postgres")]
pub use sql::Postgres;
#[cfg(feature = "sqlite")]
pub use sql::Sqlite;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use sql::SqlxBackend;
