//! Registry of scoring clients keyed by model identifier.
//!
//! Loading a quality-estimation model is expensive on the service side, so
//! a run asks the registry for a client instead of building one per call.
//! The registry is an ordinary value owned by whoever drives the pipeline;
//! nothing here is process-global.

use crate::models::{OracleConfig, Result};
use crate::oracle::CometClient;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Memoizes one [`CometClient`] per model.
///
/// Thread-safe: clients are shared as `Arc<CometClient>`.
pub struct OracleRegistry {
    config: OracleConfig,
    api_key: Option<String>,
    clients: DashMap<String, Arc<CometClient>>,
}

impl OracleRegistry {
    /// Build an empty registry for the given service.
    pub fn new(config: OracleConfig, api_key: Option<String>) -> Self {
        Self {
            config,
            api_key,
            clients: DashMap::new(),
        }
    }

    /// Client for the configured default model.
    pub fn default_client(&self) -> Result<Arc<CometClient>> {
        let model = self.config.model.clone();
        self.get_or_connect(&model)
    }

    /// Get the client for `model`, creating it on first use.
    pub fn get_or_connect(&self, model: &str) -> Result<Arc<CometClient>> {
        if let Some(client) = self.clients.get(model) {
            debug!(model = %model, "Reusing scoring client");
            return Ok(Arc::clone(client.value()));
        }

        let client = Arc::new(CometClient::from_config(
            &self.config,
            model,
            self.api_key.clone(),
        )?);
        info!(model = %model, base_url = %client.base_url(), "Connected scoring client");

        // A concurrent caller may have won the race; keep whichever landed first.
        let entry = self
            .clients
            .entry(model.to_string())
            .or_insert_with(|| client);
        Ok(Arc::clone(entry.value()))
    }

    /// Get the number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if no client has been created yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
