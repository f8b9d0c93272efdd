//! Logical destination → fallback endpoint mapping

use crate::types::EndpointConfig;
use std::collections::HashMap;
use tracing::info;

/// Endpoint registry keyed by `service_name`
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointConfig>,
}

impl EndpointRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint, replacing any previous one with the same name
    pub fn register(&mut self, endpoint: EndpointConfig) -> Option<EndpointConfig> {
        let name = endpoint.service_name.clone();
        let previous = self.endpoints.insert(name.clone(), endpoint);
        if previous.is_some() {
            info!("Replaced endpoint registration: {}", name);
        } else {
            info!("Registered endpoint: {}", name);
        }
        previous
    }

    /// Resolve a logical name
    pub fn resolve(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.get(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of all endpoints, sorted by name
    pub fn endpoints(&self) -> Vec<EndpointConfig> {
        let mut endpoints: Vec<EndpointConfig> = self.endpoints.values().cloned().collect();
        endpoints.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        endpoints
    }

    /// Number of registered endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
