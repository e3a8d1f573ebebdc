//! Filesystem checkpoints of published models.
//!
//! Layout inside the checkpoint directory:
//!
//! ```text
//! model_v00000012.bin    raw weights of version 12
//! model_v00000012.json   manifest (version, training step, stats)
//! latest.json            copy of the newest manifest
//! ```
//!
//! Manifests are written to a temporary file and renamed into place, so a
//! reader never sees a half-written `latest.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::{unix_now, ModelVersion, SharedStorage, StorageStats};
use crate::StorageError;

const LATEST_MANIFEST: &str = "latest.json";
const FILE_PREFIX: &str = "model_v";

/// Metadata written next to each checkpoint's weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub version: u64,
    pub training_step: u64,
    pub published_at: u64,
    pub saved_at: u64,
    pub weights_file: String,
    pub weights_len: usize,
    pub stats: StorageStats,
}

/// Writes, lists, prunes and restores checkpoints in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointStore {
    /// `max_checkpoints == 0` keeps every checkpoint.
    pub fn new(dir: impl AsRef<Path>, max_checkpoints: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_checkpoints,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn weights_name(version: u64) -> String {
        format!("{FILE_PREFIX}{version:08}.bin")
    }

    fn manifest_name(version: u64) -> String {
        format!("{FILE_PREFIX}{version:08}.json")
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Write a checkpoint of `model`, update `latest.json` and prune old ones.
    pub fn save(
        &self,
        model: &ModelVersion,
        stats: &StorageStats,
    ) -> Result<CheckpointManifest, StorageError> {
        fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;

        let weights_file = Self::weights_name(model.version);
        let weights_path = self.dir.join(&weights_file);
        fs::write(&weights_path, &model.weights).map_err(Self::io_error(&weights_path))?;

        let manifest = CheckpointManifest {
            version: model.version,
            training_step: model.training_step,
            published_at: model.published_at,
            saved_at: unix_now(),
            weights_file,
            weights_len: model.weights.len(),
            stats: stats.clone(),
        };
        self.write_manifest(&Self::manifest_name(model.version), &manifest)?;
        self.write_manifest(LATEST_MANIFEST, &manifest)?;

        info!(
            version = model.version,
            training_step = model.training_step,
            dir = %self.dir.display(),
            "Saved checkpoint"
        );

        self.prune()?;
        Ok(manifest)
    }

    fn write_manifest(&self, name: &str, manifest: &CheckpointManifest) -> Result<(), StorageError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let json = serde_json::to_vec_pretty(manifest).map_err(|e| StorageError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&tmp, json).map_err(Self::io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(Self::io_error(&path))?;
        Ok(())
    }

    fn read_manifest(path: &Path) -> Result<CheckpointManifest, StorageError> {
        let bytes = fs::read(path).map_err(Self::io_error(path))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Checkpointed versions, oldest first.
    pub fn list(&self) -> Result<Vec<u64>, StorageError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(Self::io_error(&self.dir))?;
        let mut versions: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_prefix(FILE_PREFIX)?
                    .strip_suffix(".json")?
                    .parse::<u64>()
                    .ok()
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Remove the oldest checkpoints beyond `max_checkpoints`. Returns how many
    /// were removed.
    pub fn prune(&self) -> Result<usize, StorageError> {
        if self.max_checkpoints == 0 {
            return Ok(0);
        }
        let versions = self.list()?;
        if versions.len() <= self.max_checkpoints {
            return Ok(0);
        }

        let excess = versions.len() - self.max_checkpoints;
        for &version in &versions[..excess] {
            for name in [Self::manifest_name(version), Self::weights_name(version)] {
                let path = self.dir.join(name);
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove old checkpoint file");
                }
            }
            debug!(version, "Pruned checkpoint");
        }
        Ok(excess)
    }

    /// Load the newest checkpoint, if any.
    pub fn load_latest(&self) -> Result<Option<(ModelVersion, CheckpointManifest)>, StorageError> {
        let latest = self.dir.join(LATEST_MANIFEST);
        if !latest.exists() {
            return Ok(None);
        }
        let manifest = Self::read_manifest(&latest)?;

        let weights_path = self.dir.join(&manifest.weights_file);
        let weights = fs::read(&weights_path).map_err(Self::io_error(&weights_path))?;
        if weights.len() != manifest.weights_len {
            return Err(StorageError::Manifest {
                path: latest,
                message: format!(
                    "weights file has {} bytes, manifest says {}",
                    weights.len(),
                    manifest.weights_len
                ),
            });
        }

        let model = ModelVersion {
            weights: weights.into(),
            version: manifest.version,
            training_step: manifest.training_step,
            published_at: manifest.published_at,
        };
        Ok(Some((model, manifest)))
    }

    /// Shared storage starting from the newest checkpoint, or `None` when the
    /// directory holds no checkpoint.
    pub fn restore(&self) -> Result<Option<SharedStorage>, StorageError> {
        let Some((model, manifest)) = self.load_latest()? else {
            debug!(dir = %self.dir.display(), "No checkpoint to restore");
            return Ok(None);
        };
        info!(
            version = manifest.version,
            training_step = manifest.training_step,
            "Restored model from checkpoint"
        );
        Ok(Some(SharedStorage::with_initial(model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn model(version: u64) -> ModelVersion {
        ModelVersion::new(vec![version as u8; 16], version, version * 100)
    }

    #[test]
    fn test_file_names() {
        assert_eq!(CheckpointStore::weights_name(12), "model_v00000012.bin");
        assert_eq!(CheckpointStore::manifest_name(12), "model_v00000012.json");
    }

    #[test]
    fn test_save_and_load_latest() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 5);

        let stats = StorageStats {
            version: 3,
            training_step: 300,
            games_recorded: 7,
            ..Default::default()
        };
        let manifest = store.save(&model(3), &stats).unwrap();
        assert_eq!(manifest.weights_len, 16);
        assert!(dir.path().join("model_v00000003.bin").exists());
        assert!(dir.path().join("latest.json").exists());

        let (loaded, loaded_manifest) = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.training_step, 300);
        assert!(loaded.weights.iter().all(|&b| b == 3));
        assert_eq!(loaded_manifest.stats.games_recorded, 7);
    }

    #[test]
    fn test_latest_tracks_newest_save() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 0);
        store.save(&model(1), &StorageStats::default()).unwrap();
        store.save(&model(2), &StorageStats::default()).unwrap();

        let (loaded, _) = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(store.list().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 2);
        for v in 1..=4 {
            store.save(&model(v), &StorageStats::default()).unwrap();
        }

        assert_eq!(store.list().unwrap(), vec![3, 4]);
        assert!(!dir.path().join("model_v00000001.bin").exists());
        assert!(!dir.path().join("model_v00000002.json").exists());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nope"), 3);
        assert!(store.list().unwrap().is_empty());
        assert!(store.load_latest().unwrap().is_none());
        assert!(store.restore().unwrap().is_none());
    }

    #[test]
    fn test_truncated_weights_rejected() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 3);
        store.save(&model(5), &StorageStats::default()).unwrap();
        fs::write(dir.path().join("model_v00000005.bin"), [0u8; 4]).unwrap();

        let err = store.load_latest().unwrap_err();
        assert!(matches!(err, StorageError::Manifest { .. }));
    }

    #[test]
    fn test_corrupt_manifest_rejected() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 3);
        fs::write(dir.path().join("latest.json"), b"{ not json").unwrap();
        assert!(matches!(
            store.load_latest().unwrap_err(),
            StorageError::Manifest { .. }
        ));
    }

    #[test]
    fn test_restore_continues_versions() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 3);
        store.save(&model(9), &StorageStats::default()).unwrap();

        let storage = store.restore().unwrap().unwrap();
        assert_eq!(storage.latest_version(), 9);
        assert_eq!(storage.training_step(), 900);
        assert_eq!(storage.publish(vec![1u8], 901).unwrap(), 10);
    }
}
