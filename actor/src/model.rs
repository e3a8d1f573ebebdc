//! Per-worker model cache over shared storage.
//!
//! A worker checks [`SharedStorage::latest_version`] once per move, before
//! the search starts, and rebuilds its network only when a newer version has
//! been published. A search therefore always runs against one fixed model.

use std::fmt;
use std::sync::Arc;

use mcts::{ModelInterfaceError, Network, UniformNetwork};
use model_store::{ModelVersion, SharedStorage};
use tracing::{debug, info};

use crate::metrics;

/// Turns a published weights blob into a network the search can call.
///
/// This is the seam to an external inference runtime.
pub trait NetworkFactory: Send + Sync {
    fn build(&self, model: &ModelVersion) -> Result<Arc<dyn Network>, ModelInterfaceError>;
}

/// Ignores the weights and returns a uniform-policy, zero-value network.
///
/// Stands in for a learned model when no inference runtime is wired up.
#[derive(Debug, Clone)]
pub struct UniformNetworkFactory {
    num_actions: usize,
}

impl UniformNetworkFactory {
    pub fn new(num_actions: usize) -> Self {
        Self { num_actions }
    }
}

impl NetworkFactory for UniformNetworkFactory {
    fn build(&self, _model: &ModelVersion) -> Result<Arc<dyn Network>, ModelInterfaceError> {
        Ok(Arc::new(UniformNetwork::new(self.num_actions)))
    }
}

/// The network a worker currently searches with, plus its version.
pub struct ModelCache {
    storage: Arc<SharedStorage>,
    factory: Arc<dyn NetworkFactory>,
    current: Option<(Arc<ModelVersion>, Arc<dyn Network>)>,
    reloads: u64,
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("version", &self.version())
            .field("reloads", &self.reloads)
            .finish()
    }
}

impl ModelCache {
    pub fn new(storage: Arc<SharedStorage>, factory: Arc<dyn NetworkFactory>) -> Self {
        Self {
            storage,
            factory,
            current: None,
            reloads: 0,
        }
    }

    /// Return the network for the latest published version, rebuilding it
    /// if the cached one is stale.
    ///
    /// A failed build leaves the previous network cached and is fatal to
    /// the current move.
    pub fn refresh(&mut self) -> Result<Arc<dyn Network>, ModelInterfaceError> {
        let latest = self.storage.latest_version();
        if let Some((model, network)) = &self.current {
            if model.version == latest {
                return Ok(Arc::clone(network));
            }
        }

        let model = self.storage.fetch_latest();
        let network = self.factory.build(&model)?;

        match &self.current {
            Some((previous, _)) => {
                info!(
                    from = previous.version,
                    to = model.version,
                    training_step = model.training_step,
                    "Reloaded model"
                );
                self.reloads += 1;
                metrics::MODEL_RELOADS.inc();
            }
            None => debug!(version = model.version, "Loaded initial model"),
        }

        self.current = Some((model, Arc::clone(&network)));
        Ok(network)
    }

    /// Version of the cached network, if one has been built.
    pub fn version(&self) -> Option<u64> {
        self.current.as_ref().map(|(model, _)| model.version)
    }

    /// Training step of the cached model (0 before the first refresh).
    pub fn training_step(&self) -> u64 {
        self.current
            .as_ref()
            .map(|(model, _)| model.training_step)
            .unwrap_or(0)
    }

    /// Times the network was rebuilt after the initial load.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }
}
