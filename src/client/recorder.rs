//! # Resource Recorder
//!
//! Keeps every object written during a run, keyed by kind, namespace and name.
//!
//! The recorder serves two purposes: it is the overlay that read-only runs read
//! back from (so later steps observe earlier writes), and it is the source of
//! the YAML dump written to `<outputdir>/<namespace>/<name>.<kind>.yaml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use tracing::debug;

/// A written object
#[derive(Debug, Clone)]
pub enum RecordedResource {
    Ingress(Ingress),
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl RecordedResource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RecordedResource::Ingress(_) => "Ingress",
            RecordedResource::ConfigMap(_) => "ConfigMap",
            RecordedResource::Secret(_) => "Secret",
        }
    }

    fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        match self {
            RecordedResource::Ingress(ingress) => serde_yaml::to_string(ingress),
            RecordedResource::ConfigMap(config_map) => serde_yaml::to_string(config_map),
            RecordedResource::Secret(secret) => serde_yaml::to_string(secret),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResourceKey {
    namespace: String,
    name: String,
    kind: &'static str,
}

/// What the recorder knows about one object
#[derive(Debug)]
pub enum Recorded<'a, T> {
    /// Written during this run
    Present(&'a T),
    /// Deleted during this run
    Deleted,
    /// Never touched during this run
    Unknown,
}

/// Written objects of one run; `None` marks a deletion
#[derive(Debug, Default)]
pub struct ResourceRecorder {
    entries: BTreeMap<ResourceKey, Option<RecordedResource>>,
}

impl ResourceRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, namespace: &str, name: &str, resource: RecordedResource) {
        let key = ResourceKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: resource.kind(),
        };
        self.entries.insert(key, Some(resource));
    }

    pub fn record_deletion(&mut self, kind: &'static str, namespace: &str, name: &str) {
        let key = ResourceKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
        };
        self.entries.insert(key, None);
    }

    #[must_use]
    pub fn config_map(&self, namespace: &str, name: &str) -> Recorded<'_, ConfigMap> {
        match self.lookup("ConfigMap", namespace, name) {
            Some(Some(RecordedResource::ConfigMap(cm))) => Recorded::Present(cm),
            Some(None) => Recorded::Deleted,
            _ => Recorded::Unknown,
        }
    }

    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Recorded<'_, Secret> {
        match self.lookup("Secret", namespace, name) {
            Some(Some(RecordedResource::Secret(secret))) => Recorded::Present(secret),
            Some(None) => Recorded::Deleted,
            _ => Recorded::Unknown,
        }
    }

    #[must_use]
    pub fn contains(&self, kind: &'static str, namespace: &str, name: &str) -> bool {
        matches!(self.lookup(kind, namespace, name), Some(Some(_)))
    }

    /// Number of objects that currently exist in the recording
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(
        &self,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Option<&Option<RecordedResource>> {
        self.entries.get(&ResourceKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
        })
    }

    /// Write every recorded object as YAML below `dir`
    ///
    /// Returns the number of files written. Deleted objects are skipped.
    pub fn dump(&self, dir: &Path) -> Result<usize> {
        let mut written = 0;
        for (key, resource) in &self.entries {
            let Some(resource) = resource else {
                continue;
            };
            let namespace_dir = dir.join(&key.namespace);
            fs::create_dir_all(&namespace_dir).with_context(|| {
                format!("Failed to create dump directory {}", namespace_dir.display())
            })?;

            let file = namespace_dir.join(format!(
                "{}.{}.yaml",
                key.name,
                key.kind.to_lowercase()
            ));
            let yaml = resource.to_yaml().with_context(|| {
                format!("Failed to serialize {} {}/{}", key.kind, key.namespace, key.name)
            })?;
            fs::write(&file, yaml)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            debug!("Dumped {} {}/{} to {}", key.kind, key.namespace, key.name, file.display());
            written += 1;
        }
        Ok(written)
    }
}
