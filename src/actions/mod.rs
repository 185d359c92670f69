//! System actions and the executor registry
//!
//! An [`Executor`] performs one kind of action (`volume`, `app_start`, ...).
//! The [`ActionRegistry`] maps action type names to executors and is the
//! only way the dispatcher runs actions.

pub mod app_start;
pub mod audio_source;
pub mod key_combination;
pub mod params;
pub mod volume;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Action;
use crate::platform::Platform;

pub use app_start::AppStartExecutor;
pub use audio_source::AudioSourceExecutor;
pub use key_combination::KeyCombinationExecutor;
pub use params::ParamError;
pub use volume::VolumeExecutor;

/// What an executor did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// A detached process was started
    Spawned { pid: u32 },
}

/// Registry-level failures
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no executor registered for action type '{0}'")]
    UnknownType(String),

    #[error("invalid parameters for action '{action_type}': {source}")]
    InvalidParams {
        action_type: String,
        #[source]
        source: ParamError,
    },

    #[error("action '{action_type}' failed: {source:#}")]
    Failed {
        action_type: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    /// Action type named by this error
    pub fn action_type(&self) -> &str {
        match self {
            ActionError::UnknownType(t) => t,
            ActionError::InvalidParams { action_type, .. } | ActionError::Failed { action_type, .. } => action_type,
        }
    }
}

/// Performs one kind of action
///
/// Note: Executors are shared as `Arc<dyn Executor>` and may run
/// concurrently with themselves; they must not rely on call ordering.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Action type this executor handles (e.g. "volume")
    fn name(&self) -> &str;

    /// Perform the action
    async fn execute(&self, action: &Action) -> anyhow::Result<Outcome>;

    /// Check the parameters without side effects
    async fn validate(&self, _action: &Action) -> Result<(), ParamError> {
        Ok(())
    }
}

/// Action type name → executor
#[derive(Default)]
pub struct ActionRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in executors on `platform`
    pub fn with_builtins(platform: &Platform) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(VolumeExecutor::new(platform.volume.clone())));
        registry.register(Arc::new(AppStartExecutor::new(platform.launcher.clone())));
        registry.register(Arc::new(KeyCombinationExecutor::new(platform.keyboard.clone())));
        registry.register(Arc::new(AudioSourceExecutor::new(platform.audio.clone())));
        info!("🧰 Registered actions: {}", registry.action_types().join(", "));
        registry
    }

    /// Register an executor under its name. A later registration replaces an earlier one.
    pub fn register(&self, executor: Arc<dyn Executor>) {
        let name = executor.name().to_string();
        if self.executors.write().insert(name.clone(), executor).is_some() {
            debug!("Replaced executor for action type '{}'", name);
        }
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn Executor>> {
        self.executors.read().get(action_type).cloned()
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.executors.read().contains_key(action_type)
    }

    /// Registered action type names, sorted
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.read().keys().cloned().collect();
        types.sort();
        types
    }

    fn lookup(&self, action: &Action) -> Result<Arc<dyn Executor>, ActionError> {
        self.get(&action.action_type)
            .ok_or_else(|| ActionError::UnknownType(action.action_type.clone()))
    }

    /// Run `action` on its executor
    pub async fn execute(&self, action: &Action) -> Result<Outcome, ActionError> {
        let executor = self.lookup(action)?;
        debug!(action = %action.action_type, parameters = ?action.parameters, "Executing action");

        executor.execute(action).await.map_err(|source| ActionError::Failed {
            action_type: action.action_type.clone(),
            source,
        })
    }

    /// Validate `action` against its executor without running it
    pub async fn validate(&self, action: &Action) -> Result<(), ActionError> {
        let executor = self.lookup(action)?;
        executor.validate(action).await.map_err(|source| ActionError::InvalidParams {
            action_type: action.action_type.clone(),
            source,
        })
    }
}
