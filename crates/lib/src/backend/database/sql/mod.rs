//! SQL-based backend implementations for ordering storage.
//!
//! This module provides SQL database backends that implement the
//! [`OrderingBackend`] trait, storing ordering records, scope versions and the
//! external resource collections in relational tables.
//!
//! ## Available Backends
//!
//! - **SQLite** (feature: `sqlite`): Embedded database
//! - **PostgreSQL** (feature: `postgres`): PostgreSQL database
//!
//! ## Architecture
//!
//! The SQL backend uses sqlx with `AnyPool` for multi-database support.
//! Each [`OrderingBackend::apply`] call runs in a single transaction that
//! bumps the scope's row in `scope_versions` with a compare-and-set update,
//! so a concurrent writer holding a stale version updates zero rows and the
//! whole transaction is rolled back.
//!
//! ## Schema and Migrations
//!
//! The database schema is defined in the [`schema`] module and automatically
//! initialized when connecting. Migrations are handled via code-based functions
//! rather than SQL files to support dialect differences between SQLite and PostgreSQL.

mod storage;

/// Schema definition and migration system.
pub mod schema;

use std::any::Any;
#[cfg(feature = "postgres")]
use std::time::Duration;

use async_trait::async_trait;
use sqlx::AnyPool;
#[cfg(feature = "postgres")]
use sqlx::Executor;
use sqlx::any::AnyPoolOptions;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{OrderingBackend, ScopeSnapshot, WriteOp};
use crate::merge::MergeQuery;
use crate::projection::CollectionItem;
use crate::types::{OrderingRecord, Resource, ResourceId, ResourceType, Scope};

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Similar to `anyhow::Context`, this trait adds a method to convert
/// sqlx errors to `BackendError::SqlxError` with a context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// SQL-based backend implementing [`OrderingBackend`] using sqlx.
///
/// This backend supports both SQLite and PostgreSQL through sqlx's `AnyPool`.
///
/// # Test Isolation
///
/// For PostgreSQL, each backend instance can use its own schema for test isolation.
/// Use `connect_postgres_isolated()` to create an isolated backend for testing.
#[derive(Debug)]
pub struct SqlxBackend {
    pool: AnyPool,
}

impl SqlxBackend {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// SQLite-specific implementations
#[cfg(feature = "sqlite")]
impl SqlxBackend {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sorteia::backend::database::sql::SqlxBackend;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let backend = SqlxBackend::open_sqlite("sorteia.db").await.unwrap();
    /// }
    /// ```
    pub async fn open_sqlite<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect_sqlite(&url).await
    }

    /// Connect to a SQLite database using a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite:./sorteia.db")
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // A shared-cache in-memory database is destroyed when its last
        // connection closes, so the pool must keep one open forever.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            // - journal_mode=WAL: readers don't block the single writer
            // - synchronous=NORMAL: safe with WAL
            // - busy_timeout=5000: wait up to 5s for the write lock
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        let backend = Self { pool };

        schema::initialize(&backend).await?;
        tracing::debug!(url, "Connected SQLite ordering backend");

        Ok(backend)
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this backend instance.
    /// Useful for testing.
    pub async fn sqlite_in_memory() -> Result<Self> {
        // Shared cache lets every pooled connection see the same database.
        // The unique name keeps separate instances apart.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url).await
    }
}

// PostgreSQL-specific implementations
#[cfg(feature = "postgres")]
impl SqlxBackend {
    /// Connect to a PostgreSQL database using a connection URL.
    ///
    /// This connects to the default (public) schema. For test isolation,
    /// use `connect_postgres_isolated()` instead.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sorteia::backend::database::sql::SqlxBackend;
    ///
    /// let backend = SqlxBackend::connect_postgres("postgres://localhost/sorteia").await.unwrap();
    /// ```
    pub async fn connect_postgres(url: &str) -> Result<Self> {
        Self::connect_postgres_with_schema(url, None).await
    }

    /// Connect to a PostgreSQL database, optionally inside a dedicated schema.
    async fn connect_postgres_with_schema(url: &str, schema_name: Option<String>) -> Result<Self> {
        sqlx::any::install_default_drivers();

        if let Some(ref schema) = schema_name {
            let temp_pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .sql_context("Failed to connect to PostgreSQL")?;

            let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
            sqlx::query(&create_schema)
                .execute(&temp_pool)
                .await
                .sql_context(&format!("Failed to create schema {schema}"))?;

            temp_pool.close().await;
        }

        // Isolated (test) pools stay small so parallel tests don't exhaust
        // the server's max_connections.
        let schema_for_hook = schema_name.clone();
        let mut pool_options = AnyPoolOptions::new();
        if schema_name.is_some() {
            pool_options = pool_options
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(30));
        } else {
            pool_options = pool_options.max_connections(5);
        }

        let pool = pool_options
            .after_connect(move |conn, _meta| {
                let schema = schema_for_hook.clone();
                Box::pin(async move {
                    if let Some(ref s) = schema {
                        let set_path = format!("SET search_path TO {s}");
                        conn.execute(set_path.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        let backend = Self { pool };

        schema::initialize(&backend).await?;
        tracing::debug!(schema = ?schema_name, "Connected PostgreSQL ordering backend");

        Ok(backend)
    }

    /// Connect to a PostgreSQL database with test isolation.
    ///
    /// Creates a unique schema for this backend instance, ensuring tests
    /// don't interfere with each other when run in parallel.
    pub async fn connect_postgres_isolated(url: &str) -> Result<Self> {
        // Schema names must start with a letter and be lowercase.
        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        let schema_name = format!("test_{unique_id}");
        Self::connect_postgres_with_schema(url, Some(schema_name)).await
    }
}

#[async_trait]
impl OrderingBackend for SqlxBackend {
    async fn find_by_key(
        &self,
        scope: &Scope,
        resource_id: &ResourceId,
    ) -> Result<Option<OrderingRecord>> {
        storage::find_by_key(self, scope, resource_id).await
    }

    async fn find_scope(&self, scope: &Scope) -> Result<ScopeSnapshot> {
        storage::find_scope(self, scope).await
    }

    async fn resource_exists(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        storage::resource_exists(self, resource_type, resource_id).await
    }

    async fn apply(
        &self,
        scope: &Scope,
        expected_version: u64,
        writes: Vec<WriteOp>,
    ) -> Result<()> {
        storage::apply(self, scope, expected_version, writes).await
    }

    async fn join_resources(&self, scope: &Scope) -> Result<Vec<(OrderingRecord, Resource)>> {
        storage::join_resources(self, scope).await
    }

    async fn left_join_merge(
        &self,
        scope: &Scope,
        query: &MergeQuery,
    ) -> Result<Vec<CollectionItem>> {
        storage::left_join_merge(self, scope, query).await
    }

    async fn ensure_indexes(&self) -> Result<()> {
        schema::create_indexes(self).await
    }

    async fn put_resource(&self, resource_type: &ResourceType, resource: Resource) -> Result<()> {
        storage::put_resource(self, resource_type, resource).await
    }

    async fn remove_resource(
        &self,
        resource_type: &ResourceType,
        resource_id: &ResourceId,
    ) -> Result<bool> {
        storage::remove_resource(self, resource_type, resource_id).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(feature = "sqlite")]
/// Convenience type alias for SQLite backend using sqlx.
pub type Sqlite = SqlxBackend;

#[cfg(feature = "postgres")]
/// Convenience type alias for PostgreSQL backend using sqlx.
pub type Postgres = SqlxBackend;
