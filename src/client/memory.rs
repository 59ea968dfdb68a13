//! # In-Memory Cluster
//!
//! [`ClusterClient`] over plain maps, for tests and dry experiments.
//! Ingresses are listed in insertion order.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;

use super::{object_ref, ClusterClient};
use crate::error::ClientError;

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    ingresses: Vec<Ingress>,
    config_maps: BTreeMap<Key, ConfigMap>,
    secrets: BTreeMap<Key, Secret>,
    secret_updates: usize,
}

/// Cluster state held in memory
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn ingress_key(ingress: &Ingress) -> Key {
    let meta = ingress.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn with_ingress(self, ingress: Ingress) -> Self {
        self.state().ingresses.push(ingress);
        self
    }

    #[must_use]
    pub fn with_config_map(self, config_map: ConfigMap) -> Self {
        let meta = config_map.meta();
        let k = key(
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default(),
        );
        self.state().config_maps.insert(k, config_map);
        self
    }

    #[must_use]
    pub fn with_secret(self, secret: Secret) -> Self {
        let meta = secret.meta();
        let k = key(
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default(),
        );
        self.state().secrets.insert(k, secret);
        self
    }

    #[must_use]
    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.state()
            .ingresses
            .iter()
            .find(|ing| ingress_key(ing) == key(namespace, name))
            .cloned()
    }

    /// `namespace/name` of every stored Ingress, in insertion order
    #[must_use]
    pub fn ingress_names(&self) -> Vec<String> {
        self.state()
            .ingresses
            .iter()
            .map(|ing| {
                let (namespace, name) = ingress_key(ing);
                format!("{namespace}/{name}")
            })
            .collect()
    }

    #[must_use]
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.state().config_maps.get(&key(namespace, name)).cloned()
    }

    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state().secrets.get(&key(namespace, name)).cloned()
    }

    /// Number of `update_secret` calls seen so far
    #[must_use]
    pub fn secret_updates(&self) -> usize {
        self.state().secret_updates
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
impl ClusterClient for MemoryCluster {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, ClientError> {
        Ok(self.state().ingresses.clone())
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(ingress, "Ingress")?;
        let mut state = self.state();
        if state.ingresses.iter().any(|ing| ingress_key(ing) == key(&namespace, &name)) {
            return Err(ClientError::AlreadyExists {
                kind: "Ingress",
                namespace,
                name,
            });
        }
        state.ingresses.push(ingress.clone());
        Ok(())
    }

    async fn update_ingress(&self, ingress: &Ingress) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(ingress, "Ingress")?;
        let mut state = self.state();
        let existing = state
            .ingresses
            .iter_mut()
            .find(|ing| ingress_key(ing) == key(&namespace, &name))
            .ok_or_else(|| not_found("Ingress", &namespace, &name))?;
        *existing = ingress.clone();
        Ok(())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError> {
        self.config_map(namespace, name)
            .ok_or_else(|| not_found("ConfigMap", namespace, name))
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(config_map, "ConfigMap")?;
        let mut state = self.state();
        let k = key(&namespace, &name);
        if state.config_maps.contains_key(&k) {
            return Err(ClientError::AlreadyExists {
                kind: "ConfigMap",
                namespace,
                name,
            });
        }
        state.config_maps.insert(k, config_map.clone());
        Ok(())
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(config_map, "ConfigMap")?;
        let mut state = self.state();
        let k = key(&namespace, &name);
        if !state.config_maps.contains_key(&k) {
            return Err(not_found("ConfigMap", &namespace, &name));
        }
        state.config_maps.insert(k, config_map.clone());
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.state()
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found("ConfigMap", namespace, name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        self.secret(namespace, name)
            .ok_or_else(|| not_found("Secret", namespace, name))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), ClientError> {
        let (namespace, name) = object_ref(secret, "Secret")?;
        let mut state = self.state();
        let k = key(&namespace, &name);
        if !state.secrets.contains_key(&k) {
            return Err(not_found("Secret", &namespace, &name));
        }
        state.secrets.insert(k, secret.clone());
        state.secret_updates += 1;
        Ok(())
    }
}
