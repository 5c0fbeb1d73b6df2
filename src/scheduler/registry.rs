//! Shared, mutable endpoint list.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::probe::EndpointSpec;

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("API with name '{0}' already exists")]
    DuplicateName(String),
    #[error("API with URL '{0}' already exists")]
    DuplicateUrl(String),
    #[error("API '{0}' not found")]
    NotFound(String),
    #[error("Cannot delete the last API")]
    LastEndpoint,
}

/// Endpoint list shared between the scheduler and the dashboard.
///
/// Every cycle works on a snapshot, so edits take effect at the next cycle.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Arc<RwLock<Vec<EndpointSpec>>>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<EndpointSpec>) -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(endpoints)),
        }
    }

    pub async fn snapshot(&self) -> Vec<EndpointSpec> {
        self.endpoints.read().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<EndpointSpec> {
        self.endpoints
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }

    /// Append an endpoint. Names and URLs must be unique.
    pub async fn add(&self, spec: EndpointSpec) -> Result<(), RegistryError> {
        let mut endpoints = self.endpoints.write().await;

        if endpoints.iter().any(|e| e.name == spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        if endpoints.iter().any(|e| e.url == spec.url) {
            return Err(RegistryError::DuplicateUrl(spec.url));
        }

        endpoints.push(spec);
        Ok(())
    }

    /// Replace the endpoint called `name`, keeping its position.
    ///
    /// Returns the previous definition.
    pub async fn update(&self, name: &str, spec: EndpointSpec) -> Result<EndpointSpec, RegistryError> {
        let mut endpoints = self.endpoints.write().await;

        let index = endpoints
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let (name_taken, url_taken) = endpoints
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .fold((false, false), |(name, url), (_, e)| {
                (name || e.name == spec.name, url || e.url == spec.url)
            });
        if name_taken {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        if url_taken {
            return Err(RegistryError::DuplicateUrl(spec.url));
        }

        Ok(std::mem::replace(&mut endpoints[index], spec))
    }

    /// Remove an endpoint. The last one cannot be removed.
    pub async fn remove(&self, name: &str) -> Result<EndpointSpec, RegistryError> {
        let mut endpoints = self.endpoints.write().await;

        let index = endpoints
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if endpoints.len() == 1 {
            return Err(RegistryError::LastEndpoint);
        }

        Ok(endpoints.remove(index))
    }
}
