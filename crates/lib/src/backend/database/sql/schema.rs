//! SQL schema definitions and migrations.
//!
//! This module contains the database schema used by SQL backends.
//! The schema is designed to be portable between SQLite and Postgres.
//!
//! # Migration System
//!
//! The migration system uses code-based migrations rather than SQL files to handle
//! dialect differences between SQLite and PostgreSQL. Each migration is a function
//! that receives the backend and can execute database-specific SQL as needed.
//!
//! ## Adding a New Migration
//!
//! 1. Increment `SCHEMA_VERSION`
//! 2. Add a new `migrate_vN_to_vM` async function
//! 3. Add the migration to the match statement in `run_migration`

use crate::Result;
use crate::backend::errors::BackendError;

use super::SqlxBackend;

/// Current schema version.
///
/// Increment this when making schema changes that require migration.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
///
/// Timestamps are stored as BIGINT milliseconds since the Unix epoch.
pub const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    // One row per (owner, resource type) ever written; bumped by every commit
    "CREATE TABLE IF NOT EXISTS scope_versions (
        owner TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        version BIGINT NOT NULL,
        PRIMARY KEY (owner, resource_type)
    )",
    "CREATE TABLE IF NOT EXISTS ordering_records (
        id TEXT PRIMARY KEY NOT NULL,
        owner TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        resource_id TEXT NOT NULL,
        position BIGINT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    // External collections; payload is the item's JSON document
    "CREATE TABLE IF NOT EXISTS resources (
        resource_type TEXT NOT NULL,
        resource_id TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (resource_type, resource_id)
    )",
];

/// SQL statements to create indexes.
///
/// Position is indexed but not unique: a transaction shifting a block of
/// records passes through states where two rows share a position.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_ordering_scope_resource
        ON ordering_records(owner, resource_type, resource_id)",
    "CREATE INDEX IF NOT EXISTS idx_ordering_scope_position
        ON ordering_records(owner, resource_type, position)",
    "CREATE INDEX IF NOT EXISTS idx_ordering_resource
        ON ordering_records(resource_type, resource_id)",
];

/// Initialize the database schema.
///
/// Creates tables and indexes if they don't exist, and handles migrations
/// if the schema version has changed.
pub async fn initialize(backend: &SqlxBackend) -> Result<()> {
    let pool = backend.pool();

    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Schema creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .map_err(|e| BackendError::SqlxError {
            reason: format!("Failed to check schema version: {e}"),
            source: Some(e),
        })?;

    if row.is_none() {
        sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Failed to initialize schema version: {e}"),
                source: Some(e),
            })?;
    } else if let Some((current_version,)) = row
        && current_version < SCHEMA_VERSION
    {
        migrate(backend, current_version, SCHEMA_VERSION).await?;
    }

    create_indexes(backend).await
}

/// Create the uniqueness and lookup indexes. Idempotent.
pub async fn create_indexes(backend: &SqlxBackend) -> Result<()> {
    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(backend.pool())
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Index creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }
    tracing::debug!(count = CREATE_INDEXES.len(), "Ordering indexes ensured");
    Ok(())
}

/// Run migrations sequentially from one schema version to another.
async fn migrate(backend: &SqlxBackend, from: i64, to: i64) -> Result<()> {
    tracing::info!(from, to, "Starting SQL schema migration");

    let mut current = from;
    while current < to {
        let next = current + 1;
        tracing::info!(from = current, to = next, "Running migration");

        run_migration(backend, current, next).await?;

        sqlx::query("UPDATE schema_version SET version = $1")
            .bind(next)
            .execute(backend.pool())
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Failed to update schema version to {next}: {e}"),
                source: Some(e),
            })?;

        tracing::info!(version = next, "Migration completed");
        current = next;
    }

    Ok(())
}

/// Execute a single migration step.
///
/// There are no migrations yet, so any attempt to migrate is an error.
async fn run_migration(backend: &SqlxBackend, from: i64, to: i64) -> Result<()> {
    let _ = backend;

    Err(BackendError::SqlxError {
        reason: format!(
            "Unknown migration path: v{from} to v{to}. \
             This likely means SCHEMA_VERSION was incremented without adding a migration."
        ),
        source: None,
    }
    .into())
}
