//! # kube-rs Cluster Client
//!
//! [`ClusterClient`] backed by the Kubernetes API.
//!
//! Every successful write is recorded. In read-only mode writes are only
//! recorded, and reads consult the recording before the API server so the
//! rest of the run behaves as if the writes had happened.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::{debug, info};

use super::recorder::{Recorded, RecordedResource, ResourceRecorder};
use super::{object_ref, ClusterClient};
use crate::error::ClientError;

/// Kubernetes API client with optional read-only mode
pub struct KubeClusterClient {
    client: Client,
    read_only: bool,
    recorder: Mutex<ResourceRecorder>,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient")
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client, read_only: bool) -> Self {
        Self {
            client,
            read_only,
            recorder: Mutex::new(ResourceRecorder::new()),
        }
    }

    /// Whether the API server supports `pathType` on Ingress paths (Kubernetes 1.18+)
    pub async fn detect_ingress_enhancements(&self) -> Result<bool, ClientError> {
        let version = self.client.apiserver_version().await?;
        let available = ingress_enhancements_available(&version.major, &version.minor);
        info!(
            "Kubernetes API server version {}.{} (ingress enhancements: {})",
            version.major, version.minor, available
        );
        Ok(available)
    }

    /// Dump every recorded write as YAML below `dir`
    pub fn dump(&self, dir: &Path) -> anyhow::Result<usize> {
        self.recorder().dump(dir)
    }

    fn recorder(&self) -> MutexGuard<'_, ResourceRecorder> {
        self.recorder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, namespace: &str, name: &str, resource: RecordedResource) {
        self.recorder().record(namespace, name, resource);
    }

    async fn ingress_exists(&self, namespace: &str, name: &str) -> Result<bool, ClientError> {
        let recorded = self.recorder().contains("Ingress", namespace, name);
        if recorded {
            return Ok(true);
        }
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }
}

/// Map API errors with well-known status codes onto typed client errors
fn classify(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> ClientError {
    match err {
        kube::Error::Api(ref status) if status.code == 404 => ClientError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref status) if status.code == 409 && status.reason == "AlreadyExists" => {
            ClientError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        other => ClientError::Api(other),
    }
}

fn already_exists(kind: &'static str, namespace: &str, name: &str) -> ClientError {
    ClientError::AlreadyExists {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> ClientError {
    ClientError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, ClientError> {
        let api: Api<Ingress> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        debug!("Listed {} Ingress resources", list.items.len());
        Ok(list.items)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(ingress, "Ingress")?;
        if self.read_only {
            if self.ingress_exists(&namespace, &name).await? {
                return Err(already_exists("Ingress", &namespace, &name));
            }
        } else {
            let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
            api.create(&PostParams::default(), ingress)
                .await
                .map_err(|e| classify(e, "Ingress", &namespace, &name))?;
        }
        self.record(&namespace, &name, RecordedResource::Ingress(ingress.clone()));
        Ok(())
    }

    async fn update_ingress(&self, ingress: &Ingress) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(ingress, "Ingress")?;
        if !self.read_only {
            let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
            api.replace(&name, &PostParams::default(), ingress)
                .await
                .map_err(|e| classify(e, "Ingress", &namespace, &name))?;
        }
        self.record(&namespace, &name, RecordedResource::Ingress(ingress.clone()));
        Ok(())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError> {
        let recorded = match self.recorder().config_map(namespace, name) {
            Recorded::Present(config_map) => Some(Ok(config_map.clone())),
            Recorded::Deleted => Some(Err(not_found("ConfigMap", namespace, name))),
            Recorded::Unknown => None,
        };
        if let Some(result) = recorded {
            return result;
        }
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| classify(e, "ConfigMap", namespace, name))
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(config_map, "ConfigMap")?;
        if self.read_only {
            match self.get_config_map(&namespace, &name).await {
                Ok(_) => return Err(already_exists("ConfigMap", &namespace, &name)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        } else {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
            api.create(&PostParams::default(), config_map)
                .await
                .map_err(|e| classify(e, "ConfigMap", &namespace, &name))?;
        }
        self.record(&namespace, &name, RecordedResource::ConfigMap(config_map.clone()));
        Ok(())
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(config_map, "ConfigMap")?;
        if !self.read_only {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
            api.replace(&name, &PostParams::default(), config_map)
                .await
                .map_err(|e| classify(e, "ConfigMap", &namespace, &name))?;
        }
        self.record(&namespace, &name, RecordedResource::ConfigMap(config_map.clone()));
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        if self.read_only {
            // Absent objects surface as NotFound, like the live API
            self.get_config_map(namespace, name).await?;
        } else {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
            api.delete(name, &DeleteParams::default())
                .await
                .map_err(|e| classify(e, "ConfigMap", namespace, name))?;
        }
        self.recorder().record_deletion("ConfigMap", namespace, name);
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        let recorded = match self.recorder().secret(namespace, name) {
            Recorded::Present(secret) => Some(Ok(secret.clone())),
            Recorded::Deleted => Some(Err(not_found("Secret", namespace, name))),
            Recorded::Unknown => None,
        };
        if let Some(result) = recorded {
            return result;
        }
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(secret, "Secret")?;
        if !self.read_only {
            let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
            api.replace(&name, &PostParams::default(), secret)
                .await
                .map_err(|e| classify(e, "Secret", &namespace, &name))?;
        }
        self.record(&namespace, &name, RecordedResource::Secret(secret.clone()));
        Ok(())
    }
}

/// `pathType` is honoured from Kubernetes 1.18 on
///
/// Managed clusters report versions like `1` / `21+`; the trailing `+` is ignored.
#[must_use]
pub fn ingress_enhancements_available(major: &str, minor: &str) -> bool {
    let parse = |v: &str| v.trim().trim_end_matches('+').parse::<u32>().ok();
    match (parse(major), parse(minor)) {
        (Some(major), Some(minor)) => major > 1 || (major == 1 && minor >= 18),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhancements_from_version() {
        assert!(ingress_enhancements_available("1", "18"));
        assert!(ingress_enhancements_available("1", "21+"));
        assert!(ingress_enhancements_available("2", "0"));
        assert!(!ingress_enhancements_available("1", "17"));
        assert!(!ingress_enhancements_available("1", ""));
        assert!(!ingress_enhancements_available("v1", "20"));
    }
}
