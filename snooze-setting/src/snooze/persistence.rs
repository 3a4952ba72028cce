// Durable blob storage for the snooze registry
// Blobs are persisted to $STATE_DIR/state.json with file locking and atomic replacement

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Key-value blob store that survives process restarts
pub trait DurableStore {
    /// Read the blob stored under `blob_key`, or `default` when absent
    fn get<T: DeserializeOwned>(&self, blob_key: &str, default: T) -> Result<T>;

    /// Overwrite the blob stored under `blob_key`
    fn set<T: Serialize>(&mut self, blob_key: &str, value: &T) -> Result<()>;
}

/// All blobs in a single JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Load every blob, treating a missing or empty file as no blobs
    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open state file: {}", self.path.display()))?;
        file.lock_shared()
            .with_context(|| "Failed to acquire shared lock on state file")?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }
}

impl DurableStore for JsonStateFile {
    fn get<T: DeserializeOwned>(&self, blob_key: &str, default: T) -> Result<T> {
        match self.read_all()?.remove(blob_key) {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Failed to decode blob '{}'", blob_key)),
            None => Ok(default),
        }
    }

    fn set<T: Serialize>(&mut self, blob_key: &str, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        // Serialize read-modify-write cycles across processes
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .with_context(|| format!("Failed to open lock file for {}", self.path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| "Failed to acquire exclusive lock on state file")?;

        let mut blobs = self.read_all()?;
        let encoded = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize blob '{}'", blob_key))?;
        blobs.insert(blob_key.to_string(), encoded);

        let contents =
            serde_json::to_string_pretty(&blobs).with_context(|| "Failed to serialize state")?;
        atomic_write(&self.path, &contents)

        // Lock is released when lock_file is dropped
    }
}

/// In-process blob store, used by tests and embedders without a disk
#[derive(Debug, Clone, Default)]
pub struct MemoryDurableStore {
    blobs: HashMap<String, Value>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw view of a stored blob
    pub fn raw(&self, blob_key: &str) -> Option<&Value> {
        self.blobs.get(blob_key)
    }
}

impl DurableStore for MemoryDurableStore {
    fn get<T: DeserializeOwned>(&self, blob_key: &str, default: T) -> Result<T> {
        match self.blobs.get(blob_key) {
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("Failed to decode blob '{}'", blob_key)),
            None => Ok(default),
        }
    }

    fn set<T: Serialize>(&mut self, blob_key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize blob '{}'", blob_key))?;
        self.blobs.insert(blob_key.to_string(), encoded);
        Ok(())
    }
}

/// Atomically save data to a file using write-to-temp + rename.
///
/// A symlinked `path` is resolved so the link survives and its target is
/// replaced. An existing file's permissions carry over to the new one.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let path = resolved.as_path();
    let existing_permissions = fs::metadata(path).ok().map(|meta| meta.permissions());

    let parent = path
        .parent()
        .with_context(|| format!("Invalid path: {}", path.display()))?;

    // Temp file in the same directory keeps the rename on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown"),
        std::process::id()
    ));

    fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

    if let Some(permissions) = existing_permissions {
        fs::set_permissions(&temp_path, permissions).with_context(|| {
            format!("Failed to set permissions on {}", temp_path.display())
        })?;
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
