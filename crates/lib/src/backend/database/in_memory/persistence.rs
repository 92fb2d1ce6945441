//! Persistence operations for the InMemory backend
//!
//! Serialization and file I/O for saving/loading the in-memory state to/from
//! JSON files.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use super::{Collections, InMemory, ScopeState, storage};
use crate::{
    Error, Result,
    backend::errors::BackendError,
    types::{OrderingRecord, Resource, ResourceType, Scope},
};

/// The current persistence file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const PERSISTENCE_VERSION: u8 = 0;

/// Helper to check if version is default (0) for serde skip_serializing_if
fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Validates the persistence version during deserialization.
fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}; only version {PERSISTENCE_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// One scope as written to disk. Scopes are not valid JSON map keys, so
/// they are stored as a list.
#[derive(Serialize, Deserialize)]
struct PersistedScope {
    #[serde(flatten)]
    scope: Scope,
    version: u64,
    records: Vec<OrderingRecord>,
}

/// Serializable form of the InMemory backend.
#[derive(Serialize, Deserialize)]
struct SerializableBackend {
    /// File format version for compatibility checking
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    #[serde(default)]
    scopes: Vec<PersistedScope>,
    #[serde(default)]
    collections: HashMap<ResourceType, Vec<Resource>>,
}

impl SerializableBackend {
    async fn capture(backend: &InMemory) -> Self {
        let scopes = backend.scopes.read().await;
        let collections = backend.collections.read().await;

        let mut persisted: Vec<PersistedScope> = scopes
            .iter()
            .map(|(scope, state)| {
                let mut records: Vec<OrderingRecord> = state.records.values().cloned().collect();
                records.sort_by_key(|r| r.position);
                PersistedScope {
                    scope: scope.clone(),
                    version: state.version,
                    records,
                }
            })
            .collect();
        persisted.sort_by(|a, b| a.scope.cmp(&b.scope));

        let collections = collections
            .iter()
            .map(|(resource_type, items)| {
                let mut items: Vec<Resource> = items.values().cloned().collect();
                items.sort_by(|a, b| a.id.cmp(&b.id));
                (resource_type.clone(), items)
            })
            .collect();

        SerializableBackend {
            version: PERSISTENCE_VERSION,
            scopes: persisted,
            collections,
        }
    }

    fn restore(self) -> Result<InMemory> {
        let mut scopes = HashMap::with_capacity(self.scopes.len());
        for persisted in self.scopes {
            storage::check_scope(&persisted.scope, &persisted.records)?;
            if scopes.contains_key(&persisted.scope) {
                return Err(BackendError::StateInconsistency {
                    reason: format!("scope {} is persisted twice", persisted.scope),
                }
                .into());
            }
            let records = persisted.records.into_iter().map(|r| (r.id, r)).collect();
            scopes.insert(
                persisted.scope,
                ScopeState {
                    version: persisted.version,
                    records,
                },
            );
        }

        let collections: Collections = self
            .collections
            .into_iter()
            .map(|(resource_type, items)| {
                let items = items.into_iter().map(|r| (r.id.clone(), r)).collect();
                (resource_type, items)
            })
            .collect();

        Ok(InMemory {
            scopes: RwLock::new(scopes),
            collections: RwLock::new(collections),
        })
    }
}

/// Saves the entire backend state to a specified file as JSON.
///
/// The state is written to a sibling temp file and renamed over `path`, so a
/// crash mid-write leaves the previous file intact.
pub(crate) async fn save_to_file<P: AsRef<Path>>(backend: &InMemory, path: P) -> Result<()> {
    let path = path.as_ref();
    let serializable = SerializableBackend::capture(backend).await;
    let json = serde_json::to_string_pretty(&serializable)
        .map_err(|e| -> Error { BackendError::SerializationFailed { source: e }.into() })?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })
}

/// Loads the backend state from a specified JSON file.
///
/// If the file does not exist, a new, empty `InMemory` backend is returned.
pub(crate) async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<InMemory> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => {
            let serializable: SerializableBackend =
                serde_json::from_str(&json).map_err(|e| -> Error {
                    BackendError::DeserializationFailed { source: e }.into()
                })?;
            serializable.restore()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InMemory::new()),
        Err(e) => Err(BackendError::FileIo { source: e }.into()),
    }
}
