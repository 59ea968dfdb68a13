//! # Cluster Client
//!
//! The narrow set of Kubernetes verbs the migration needs.
//!
//! - [`KubeClusterClient`]: kube-rs implementation with read-only mode and write recording
//! - [`MemoryCluster`]: in-memory implementation used by tests
//!
//! `get` signals absence with [`ClientError::NotFound`] and `create` with
//! [`ClientError::AlreadyExists`], which is what the upsert helpers build on.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;

use crate::error::ClientError;

mod kube_client;
mod memory;
mod recorder;

pub use kube_client::{ingress_enhancements_available, KubeClusterClient};
pub use memory::MemoryCluster;
pub use recorder::{Recorded, RecordedResource, ResourceRecorder};

/// Kubernetes operations consumed by the migration
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List Ingresses across all namespaces, in API order
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, ClientError>;

    async fn create_ingress(&self, ingress: &Ingress) -> Result<(), ClientError>;

    async fn update_ingress(&self, ingress: &Ingress) -> Result<(), ClientError>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError>;

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError>;

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError>;

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError>;

    async fn update_secret(&self, secret: &Secret) -> Result<(), ClientError>;

    /// Create the Ingress, falling back to an update when it already exists
    async fn upsert_ingress(&self, ingress: &Ingress) -> Result<(), ClientError> {
        match self.create_ingress(ingress).await {
            Err(e) if e.is_already_exists() => self.update_ingress(ingress).await,
            other => other,
        }
    }

    /// Create the ConfigMap, falling back to an update when it already exists
    async fn upsert_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError> {
        match self.create_config_map(config_map).await {
            Err(e) if e.is_already_exists() => self.update_config_map(config_map).await,
            other => other,
        }
    }
}

/// Namespace and name of an object that is about to be written
pub(crate) fn object_ref<K: Resource>(
    object: &K,
    kind: &'static str,
) -> Result<(String, String), ClientError> {
    let namespace = object
        .meta()
        .namespace
        .clone()
        .ok_or(ClientError::MissingMetadata {
            kind,
            field: "namespace",
        })?;
    let name = object.meta().name.clone().ok_or(ClientError::MissingMetadata {
        kind,
        field: "name",
    })?;
    Ok((namespace, name))
}
