//! Persistence backends for the memory store blob.

use crate::error::MemoryError;
use crate::model::{CURRENT_SCHEMA_VERSION, StoreSnapshot};
use log::{debug, info};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Storage backend holding the whole store as one serialized blob.
pub trait StoreProvider: Send + Sync {
    /// Load the stored blob, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<StoreSnapshot>, MemoryError>;

    /// Replace the stored blob.
    ///
    /// Fails with [`MemoryError::Conflict`] when the stored revision is not
    /// `expected_revision`, meaning another writer saved in between.
    fn save(&self, snapshot: &StoreSnapshot, expected_revision: u64) -> Result<(), MemoryError>;

    /// Remove the stored blob.
    fn clear(&self) -> Result<(), MemoryError>;
}

/// Schema version of a stored blob, read without decoding anything else.
#[derive(Debug, Default, Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

/// Revision of a stored blob, read without decoding anything else.
#[derive(Debug, Default, Deserialize)]
struct RevisionProbe {
    #[serde(default)]
    revision: u64,
}

fn decode(raw: &str) -> Result<StoreSnapshot, MemoryError> {
    // Unparseable versions fall through to the full decode, which reports them.
    if let Ok(VersionProbe { version }) = serde_json::from_str(raw)
        && version > CURRENT_SCHEMA_VERSION
    {
        return Err(MemoryError::UnsupportedSchema(version));
    }
    Ok(serde_json::from_str(raw)?)
}

fn check_revision(stored: Option<&str>, expected: u64) -> Result<(), MemoryError> {
    let found = stored.map_or(0, |raw| {
        serde_json::from_str::<RevisionProbe>(raw).map_or(0, |probe| probe.revision)
    });
    if found != expected {
        return Err(MemoryError::Conflict { expected, found });
    }
    Ok(())
}

/// File-backed provider writing the blob as pretty JSON.
#[derive(Debug, Clone)]
pub struct FileStoreProvider {
    path: PathBuf,
}

impl FileStoreProvider {
    /// Create a provider for `path`, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        info!("initialized file store provider (path={})", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_raw(&self) -> Result<Option<String>, MemoryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl StoreProvider for FileStoreProvider {
    fn load(&self) -> Result<Option<StoreSnapshot>, MemoryError> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };
        let snapshot = decode(&raw)?;
        debug!(
            "loaded store (path={}, revision={}, memories={})",
            self.path.display(),
            snapshot.revision,
            snapshot.memories.len()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StoreSnapshot, expected_revision: u64) -> Result<(), MemoryError> {
        check_revision(self.read_raw()?.as_deref(), expected_revision)?;
        let payload = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.path)?;
        debug!(
            "saved store (path={}, revision={})",
            self.path.display(),
            snapshot.revision
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), MemoryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Provider keeping the serialized blob in memory; each store instance is isolated.
#[derive(Debug, Default)]
pub struct InMemoryStoreProvider {
    blob: Mutex<Option<String>>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the provider with a raw blob, as if another writer had saved it.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(raw.into())),
        }
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn load(&self) -> Result<Option<StoreSnapshot>, MemoryError> {
        self.blob.lock().as_deref().map(decode).transpose()
    }

    fn save(&self, snapshot: &StoreSnapshot, expected_revision: u64) -> Result<(), MemoryError> {
        let mut blob = self.blob.lock();
        check_revision(blob.as_deref(), expected_revision)?;
        *blob = Some(serde_json::to_string(snapshot)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), MemoryError> {
        *self.blob.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn snapshot(revision: u64) -> StoreSnapshot {
        StoreSnapshot {
            revision,
            ..StoreSnapshot::default()
        }
    }

    #[test]
    fn file_provider_round_trips() {
        let temp = tempdir().expect("tempdir");
        let provider = FileStoreProvider::new(temp.path().join("nested/memory.json")).expect("provider");
        assert_eq!(provider.load().expect("load"), None);
        provider.save(&snapshot(1), 0).expect("save");
        let loaded = provider.load().expect("load").expect("snapshot");
        assert_eq!(loaded.revision, 1);
        assert!(!provider.temp_path().exists());
    }

    #[test]
    fn stale_writer_gets_conflict() {
        let temp = tempdir().expect("tempdir");
        let provider = FileStoreProvider::new(temp.path().join("memory.json")).expect("provider");
        provider.save(&snapshot(1), 0).expect("first save");
        provider.save(&snapshot(2), 1).expect("second save");
        let err = provider.save(&snapshot(2), 1).expect_err("conflict");
        assert!(matches!(err, MemoryError::Conflict { expected: 1, found: 2 }));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let provider = InMemoryStoreProvider::with_raw(r#"{"version": 9, "memories": []}"#);
        let err = provider.load().expect_err("unsupported");
        assert!(matches!(err, MemoryError::UnsupportedSchema(9)));
    }

    #[test]
    fn newer_schema_wins_over_malformed_fields() {
        let provider =
            InMemoryStoreProvider::with_raw(r#"{"version": 7, "revision": "seven", "memories": {}}"#);
        let err = provider.load().expect_err("unsupported");
        assert!(matches!(err, MemoryError::UnsupportedSchema(7)));
    }

    #[test]
    fn corrupt_blob_surfaces_serde_error() {
        let provider = InMemoryStoreProvider::with_raw("{not json");
        assert!(matches!(provider.load(), Err(MemoryError::Serde(_))));
    }

    #[test]
    fn clear_removes_blob() {
        let temp = tempdir().expect("tempdir");
        let provider = FileStoreProvider::new(temp.path().join("memory.json")).expect("provider");
        provider.save(&snapshot(1), 0).expect("save");
        provider.clear().expect("clear");
        provider.clear().expect("clear twice");
        assert_eq!(provider.load().expect("load"), None);
    }
}
