use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::audio::AudioSource;
use crate::call::{CallBackends, CallHandle, CallOutcome, DefaultBackends};
use crate::config::AppConfig;

/// Builds the backends for a new call from its audio source
pub type BackendsFactory = Arc<dyn Fn(AudioSource) -> Arc<dyn CallBackends> + Send + Sync>;

/// A call the server is running
pub struct CallEntry {
    pub handle: CallHandle,
    pub task: JoinHandle<CallOutcome>,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Running calls (call_id → entry)
    pub calls: Arc<RwLock<HashMap<String, CallEntry>>>,

    pub config: Arc<AppConfig>,

    pub backends: BackendsFactory,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let app = Arc::clone(&config);
        let backends: BackendsFactory = Arc::new(move |source: AudioSource| {
            Arc::new(DefaultBackends::new(&app, source)) as Arc<dyn CallBackends>
        });
        Self::with_backends(config, backends)
    }

    pub fn with_backends(config: Arc<AppConfig>, backends: BackendsFactory) -> Self {
        Self {
            calls: Arc::new(RwLock::new(HashMap::new())),
            config,
            backends,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
