//! Backend creation and utility functions.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use sorteia::{
    EngineConfig, OrderingEngine, OrderingError,
    backend::{
        OrderingBackend,
        database::{InMemory, Postgres, Sqlite, SqlxBackend},
    },
};

use crate::cli::{Backend, BackendConfig};

pub const JSON_FILE: &str = "sorteia.json";
pub const SQLITE_FILE: &str = "sorteia.db";
pub const LOCK_FILE: &str = "sorteia.lock";

const LOCK_POLL: Duration = Duration::from_millis(20);

/// Redact credentials from a PostgreSQL connection URL for safe logging
pub fn redact_postgres_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let mut redacted = parsed.clone();
        if !parsed.username().is_empty() {
            let _ = redacted.set_username("***");
        }
        if parsed.password().is_some() {
            let _ = redacted.set_password(Some("***"));
        }
        redacted.to_string()
    } else {
        "postgres://***@<unparsable-url>".to_string()
    }
}

/// Human-readable description of the configured backend.
pub fn backend_label(config: &BackendConfig) -> String {
    match config.backend {
        Backend::Sqlite => format!(
            "sqlite ({})",
            data_dir(config).join(SQLITE_FILE).display()
        ),
        Backend::Postgres => match &config.postgres_url {
            Some(url) => format!("postgres ({})", redact_postgres_url(url)),
            None => "postgres".to_string(),
        },
        Backend::Inmemory => format!(
            "inmemory ({})",
            data_dir(config).join(JSON_FILE).display()
        ),
    }
}

fn data_dir(config: &BackendConfig) -> PathBuf {
    config.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}

/// Create the appropriate backend based on configuration
pub async fn create_backend(
    config: &BackendConfig,
) -> Result<Box<dyn OrderingBackend>, Box<dyn std::error::Error>> {
    let data_dir = data_dir(config);

    match config.backend {
        Backend::Sqlite => {
            tokio::fs::create_dir_all(&data_dir).await?;
            let db_path = data_dir.join(SQLITE_FILE);
            tracing::info!("Using SQLite backend at {}", db_path.display());
            Ok(Box::new(Sqlite::open_sqlite(&db_path).await?))
        }
        Backend::Postgres => {
            let url = config
                .postgres_url
                .as_ref()
                .ok_or("PostgreSQL backend requires --postgres-url or SORTEIA_POSTGRES_URL")?;

            let display_url = redact_postgres_url(url);
            tracing::info!("Connecting to PostgreSQL backend at {}", display_url);

            match Postgres::connect_postgres(url).await {
                Ok(backend) => {
                    tracing::info!("Connected to PostgreSQL successfully");
                    Ok(Box::new(backend))
                }
                Err(e) => {
                    Err(format!("Failed to connect to PostgreSQL at {}: {}", display_url, e).into())
                }
            }
        }
        Backend::Inmemory => {
            let json_path = data_dir.join(JSON_FILE);
            tracing::info!(
                "Using in-memory backend with persistence at {}",
                json_path.display()
            );
            // A missing file loads as an empty backend; a corrupt one is an
            // error so it never gets overwritten on save.
            let backend = InMemory::load_from_file(&json_path).await?;
            Ok(Box::new(backend))
        }
    }
}

/// Take the exclusive lock on `data_dir`, waiting up to `timeout`.
///
/// The in-memory backend reads the whole state file on open and rewrites it
/// on finish, so two processes may only overlap if one waits for the other.
async fn lock_data_dir(data_dir: &Path, timeout: Duration) -> Result<File, sorteia::Error> {
    tokio::fs::create_dir_all(data_dir).await?;
    let lock_path = data_dir.join(LOCK_FILE);
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Locked {}", lock_path.display());
                return Ok(lock_file);
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if tokio::time::Instant::now() >= deadline {
                    tracing::warn!("Timed out waiting for {}", lock_path.display());
                    return Err(OrderingError::CustomOrderNotSaved {
                        reason: format!(
                            "data directory {} is in use by another sorteia process",
                            data_dir.display()
                        ),
                        source: None,
                    }
                    .into());
                }
                tokio::time::sleep(LOCK_POLL).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// An engine opened for one CLI invocation.
///
/// In-memory state only lives for the process, so [`Store::finish`] writes it
/// back to the data directory. The data directory stays locked from
/// [`Store::open`] until the store is finished or dropped.
pub struct Store {
    pub engine: OrderingEngine,
    json_path: Option<PathBuf>,
    lock: Option<File>,
}

impl Store {
    pub async fn open(config: &BackendConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let timeout = Duration::from_millis(config.write_timeout_ms);
        let (json_path, lock) = if config.backend == Backend::Inmemory {
            let dir = data_dir(config);
            let lock = lock_data_dir(&dir, timeout).await?;
            (Some(dir.join(JSON_FILE)), Some(lock))
        } else {
            (None, None)
        };

        let backend = create_backend(config).await?;
        let engine_config = EngineConfig::default().with_write_timeout(timeout);
        Ok(Self {
            engine: OrderingEngine::with_config(backend, engine_config),
            json_path,
            lock,
        })
    }

    /// Persist in-memory state, release the data directory and close
    /// database connections.
    pub async fn finish(self) -> Result<(), Box<dyn std::error::Error>> {
        let (in_memory, sql) = {
            let backend = self.engine.backend().as_any();
            (
                backend.downcast_ref::<InMemory>(),
                backend.downcast_ref::<SqlxBackend>(),
            )
        };
        if let Some(path) = &self.json_path
            && let Some(in_memory) = in_memory
        {
            in_memory.save_to_file(path).await?;
            tracing::debug!("Saved state to {}", path.display());
        } else if let Some(sql) = sql {
            sql.close().await;
        }
        if let Some(lock) = &self.lock {
            FileExt::unlock(lock)?;
        }
        Ok(())
    }
}
