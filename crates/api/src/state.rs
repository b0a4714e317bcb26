use std::sync::Arc;

use imgbatch_core::registry::JobRegistry;
use imgbatch_pipeline::BatchEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job registry, shared with the engine.
    pub registry: Arc<JobRegistry>,
    /// Background batch engine.
    pub engine: BatchEngine,
}

impl AppState {
    /// Build state around `engine`, sharing its registry.
    pub fn new(config: ServerConfig, engine: BatchEngine) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::clone(engine.registry()),
            engine,
        }
    }
}
