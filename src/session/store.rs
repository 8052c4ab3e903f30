/*!
 * Batch artifact stores.
 *
 * Every processed batch is written under its sequence number before the
 * batch counts as done. Reloading all artifacts in sequence order and
 * merging them rebuilds the aggregated translations of an interrupted run.
 */

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::StoreError;
use crate::file_utils::FileManager;
use crate::session::models::RunManifest;
use crate::translation::batch::BatchResult;

const BATCH_PREFIX: &str = "batch_";
const MANIFEST_FILE: &str = "manifest.json";

/// Persistence of per-batch results
pub trait BatchStore: Send + Sync + Debug {
    /// Store the result of one batch, replacing any artifact with the same sequence
    fn persist(&self, result: &BatchResult) -> Result<(), StoreError>;

    /// All stored results, in sequence order
    fn load_all(&self) -> Result<Vec<BatchResult>, StoreError>;

    /// Remove every stored result, returning how many were removed
    fn clear(&self) -> Result<usize, StoreError>;
}

/// Store writing one JSON file per batch into a directory
#[derive(Debug, Clone)]
pub struct JsonBatchStore {
    dir: PathBuf,
}

impl JsonBatchStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn batch_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("{}{}.json", BATCH_PREFIX, sequence))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn batch_files(&self) -> Result<Vec<(u64, PathBuf)>, StoreError> {
        FileManager::numbered_json_files(&self.dir, BATCH_PREFIX).map_err(|e| StoreError::Access {
            path: self.dir.clone(),
            message: format!("{:#}", e),
        })
    }

    /// Read the manifest, if one exists
    pub fn read_manifest(&self) -> Result<Option<RunManifest>, StoreError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<(), StoreError> {
        let path = self.manifest_path();
        FileManager::write_json(&path, manifest).map_err(|e| StoreError::Access {
            path,
            message: format!("{:#}", e),
        })
    }

    /// Prepare the directory for a fresh run.
    ///
    /// Existing batch files are an error unless `force` is set, in which case
    /// they are deleted first.
    pub fn start_fresh(&self, manifest: &RunManifest, force: bool) -> Result<(), StoreError> {
        if !self.batch_files()?.is_empty() {
            if !force {
                return Err(StoreError::ExistingBatches(self.dir.clone()));
            }
            let removed = self.clear()?;
            warn!("Removed {} batch files from a previous run in {:?}", removed, self.dir);
        }
        self.write_manifest(manifest)
    }

    /// Check that the directory belongs to this input and target language.
    ///
    /// A directory without batches is initialised with `manifest` instead.
    pub fn open_for_resume(
        &self,
        manifest: &RunManifest,
    ) -> Result<RunManifest, StoreError> {
        match self.read_manifest()? {
            Some(existing) => {
                if let Some(reason) = existing.mismatch(&manifest.source_fingerprint, &manifest.target_language) {
                    return Err(StoreError::ManifestMismatch {
                        path: self.manifest_path(),
                        reason,
                    });
                }
                info!("Resuming run {} created at {}", existing.run_id, existing.created_at);
                Ok(existing)
            }
            None if self.batch_files()?.is_empty() => {
                self.write_manifest(manifest)?;
                Ok(manifest.clone())
            }
            None => Err(StoreError::ManifestMismatch {
                path: self.manifest_path(),
                reason: "batch files exist but the manifest is missing".to_string(),
            }),
        }
    }
}

impl BatchStore for JsonBatchStore {
    fn persist(&self, result: &BatchResult) -> Result<(), StoreError> {
        let path = self.batch_path(result.sequence);
        FileManager::write_json(&path, result).map_err(|e| StoreError::Access {
            path: path.clone(),
            message: format!("{:#}", e),
        })?;
        debug!("Saved batch {} to {:?}", result.sequence, path);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<BatchResult>, StoreError> {
        let mut results = Vec::new();
        for (sequence, path) in self.batch_files()? {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let result: BatchResult = serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
            if result.sequence != sequence {
                warn!(
                    "Batch file {:?} holds sequence {}, using the file name",
                    path, result.sequence
                );
            }
            results.push(BatchResult { sequence, ..result });
        }
        Ok(results)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let files = self.batch_files()?;
        for (_, path) in &files {
            fs::remove_file(path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(files.len())
    }
}

/// Store keeping results in memory
#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    results: Mutex<BTreeMap<u64, BatchResult>>,
    fail_writes: AtomicBool,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes fail until `set_fail_writes(false)`
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pre-populate with results, e.g. from an interrupted run
    pub fn with_results(results: impl IntoIterator<Item = BatchResult>) -> Self {
        let store = Self::default();
        {
            let mut stored = store.results.lock();
            for result in results {
                stored.insert(result.sequence, result);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

impl BatchStore for MemoryBatchStore {
    fn persist(&self, result: &BatchResult) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Access {
                path: PathBuf::from(format!("memory://batch_{}", result.sequence)),
                message: "writes disabled".to_string(),
            });
        }
        self.results.lock().insert(result.sequence, result.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<BatchResult>, StoreError> {
        Ok(self.results.lock().values().cloned().collect())
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let mut results = self.results.lock();
        let count = results.len();
        results.clear();
        Ok(count)
    }
}
