//! Versioned model storage for Mirage.
//!
//! [`SharedStorage`] holds the current [`ModelVersion`]: the trainer
//! publishes, self-play workers fetch. Version numbers strictly increase and
//! a fetch always returns one complete version. [`CheckpointStore`] persists
//! versions to disk and restores the newest one on startup.
//!
//! ```rust
//! use model_store::SharedStorage;
//!
//! let storage = SharedStorage::new(vec![0u8; 4]);
//! let v = storage.publish(vec![1u8; 4], 100).unwrap();
//! assert_eq!(v, 1);
//!
//! let model = storage.fetch_latest();
//! assert_eq!(model.version, 1);
//! assert_eq!(storage.stats().training_step, 100);
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod checkpoint;
pub mod storage;

pub use checkpoint::{CheckpointManifest, CheckpointStore};
pub use storage::{ModelVersion, SharedStorage, StorageStats};

/// Errors from shared storage and checkpoints.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A publish raced with another publish. Fatal to the trainer step.
    #[error("Storage contention: expected version {expected}, found {found}")]
    Contention { expected: u64, found: u64 },

    #[error("Checkpoint I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid checkpoint manifest {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },
}

impl StorageError {
    pub fn is_contention(&self) -> bool {
        matches!(self, StorageError::Contention { .. })
    }
}
