//! # Migration Runner
//!
//! Drives one migration run over the whole cluster.
//!
//! ```text
//! delete ledger ─▶ controller ConfigMap ─▶ seed subdomains ─▶ for each Ingress:
//!     resolve ─▶ split ─▶ merge TCP ports ─▶ render + upsert ─▶ TCP ConfigMaps
//! ─▶ record ledger
//! ```
//!
//! Resources are processed one at a time in listing order, which decides how
//! name collisions are numbered. A [`ResourceError`] only drops its resource;
//! a [`RunError`] stops the batch after the entries collected so far have been
//! recorded.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::Ingress;
use tracing::{error, info, warn};

use super::alb;
use super::configmap;
use super::ledger::StatusLedger;
use super::model::{AlbSpecificData, MigratedResource};
use super::naming::UniqueNamer;
use super::render::render;
use super::resolver::{self, Resolved};
use super::splitter;
use super::subdomain::{OsRandom, RandomSource};
use super::tcp_ports;
use super::warnings::{self, Warnings};
use crate::annotations;
use crate::client::ClusterClient;
use crate::config::{MigrationMode, RunConfig};
use crate::constants::{
    INGRESS_CLASS_ANNOTATION, INGRESS_KIND, KUBE_SYSTEM, SKIPPED_INGRESS_CLASSES,
    SKIPPED_SYSTEM_INGRESSES,
};
use crate::error::{AttributedError, ResourceError, RunError};

/// Outcome of a completed run
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Ledger entries written by this run
    pub entries: Vec<MigratedResource>,
    /// Resources that could not be migrated, or only partially
    pub errors: Vec<AttributedError>,
    pub mode: MigrationMode,
}

impl MigrationReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Why a listed Ingress is not migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SystemResource,
    AlreadyMigrated,
    PrivateAlbInTestMode,
}

/// Whether `ingress` is left alone in `mode`
#[must_use]
pub fn skip_reason(ingress: &Ingress, mode: MigrationMode) -> Option<SkipReason> {
    let meta = &ingress.metadata;
    let name = meta.name.as_deref().unwrap_or_default();
    if meta.namespace.as_deref() == Some(KUBE_SYSTEM) && SKIPPED_SYSTEM_INGRESSES.contains(&name) {
        return Some(SkipReason::SystemResource);
    }

    let source_annotations = meta.annotations.as_ref();
    let class = source_annotations
        .and_then(|a| a.get(INGRESS_CLASS_ANNOTATION))
        .map(String::as_str)
        .or_else(|| {
            ingress
                .spec
                .as_ref()
                .and_then(|spec| spec.ingress_class_name.as_deref())
        });
    if class.is_some_and(|class| SKIPPED_INGRESS_CLASSES.contains(&class)) {
        return Some(SkipReason::AlreadyMigrated);
    }

    let private_alb = source_annotations
        .and_then(|a| a.get(annotations::ALB_ID))
        .is_some_and(|ids| ids.contains("private"));
    if mode == MigrationMode::Test && private_alb {
        return Some(SkipReason::PrivateAlbInTestMode);
    }
    None
}

/// State carried from one resource to the next
#[derive(Default)]
struct RunState {
    entries: Vec<MigratedResource>,
    errors: Vec<AttributedError>,
    subdomains: BTreeMap<String, String>,
    subdomain_delta: BTreeMap<String, String>,
    alb_data: AlbSpecificData,
    namer: UniqueNamer,
}

/// One migration run against a cluster
pub struct Migrator<'a> {
    client: &'a dyn ClusterClient,
    config: &'a RunConfig,
    random: Box<dyn RandomSource + 'a>,
}

impl std::fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Migrator<'a> {
    #[must_use]
    pub fn new(client: &'a dyn ClusterClient, config: &'a RunConfig) -> Self {
        Self {
            client,
            config,
            random: Box::new(OsRandom),
        }
    }

    /// Replace the source of test hostname prefixes
    #[must_use]
    pub fn with_random(mut self, random: Box<dyn RandomSource + 'a>) -> Self {
        self.random = random;
        self
    }

    /// Run the whole migration
    ///
    /// # Errors
    ///
    /// The [`RunError`] that stopped the batch; entries collected before it are recorded first.
    pub async fn run(&mut self) -> Result<MigrationReport, RunError> {
        let ledger = StatusLedger::new(self.client);
        let mode = self.config.mode;
        info!("Starting ingress migration (mode: {})", mode);

        if let Err(e) = ledger.delete().await {
            warn!("Could not delete previous migration status: {}", e);
        }

        let mut state = RunState::default();
        if let Some(entry) = configmap::migrate_controller_config(self.client, mode).await? {
            ledger
                .record(mode, vec![entry.clone()], &BTreeMap::new())
                .await?;
            state.entries.push(entry);
        }
        let recorded_before = state.entries.len();

        state.subdomains = ledger.read().await?.subdomains;
        let outcome = self.migrate_ingresses(&mut state).await;

        let new_entries = state.entries[recorded_before..].to_vec();
        let recorded = ledger.record(mode, new_entries, &state.subdomain_delta).await;
        match (outcome, recorded) {
            (Err(e), _) | (Ok(()), Err(e)) => {
                error!("Migration stopped: {}", e);
                Err(e)
            }
            (Ok(()), Ok(_)) => {
                info!(
                    "✅ Migration finished: {} resources recorded, {} errors",
                    state.entries.len(),
                    state.errors.len()
                );
                Ok(MigrationReport {
                    entries: state.entries,
                    errors: state.errors,
                    mode,
                })
            }
        }
    }

    async fn migrate_ingresses(&mut self, state: &mut RunState) -> Result<(), RunError> {
        let ingresses = self.client.list_ingresses().await?;
        info!("Found {} Ingress resources", ingresses.len());

        for ingress in &ingresses {
            let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
            let name = ingress.metadata.name.clone().unwrap_or_default();
            if let Some(reason) = skip_reason(ingress, self.config.mode) {
                info!("Skipping Ingress {}/{}: {:?}", namespace, name, reason);
                continue;
            }

            let resolved = match resolver::resolve(self.client, ingress, self.config).await {
                Ok(resolved) => resolved,
                Err(errors) => {
                    state.errors.extend(
                        errors
                            .into_iter()
                            .map(|e| AttributedError::new(INGRESS_KIND, &namespace, &name, e)),
                    );
                    continue;
                }
            };
            let entry = self.migrate_one(state, resolved).await?;
            state.entries.push(entry);
        }
        Ok(())
    }

    async fn migrate_one(
        &mut self,
        state: &mut RunState,
        resolved: Resolved,
    ) -> Result<MigratedResource, RunError> {
        let Resolved {
            config,
            tcp_ports,
            alb_ids,
            warnings: resolved_warnings,
        } = resolved;
        let attribute =
            |e: ResourceError| AttributedError::new(INGRESS_KIND, &config.namespace, &config.name, e);

        let split = splitter::split(
            &config,
            self.config,
            &mut state.namer,
            &mut state.subdomains,
            self.random.as_mut(),
        )?;
        state.subdomain_delta.extend(split.assigned);
        alb::merge(&mut state.alb_data, &tcp_ports, &alb_ids)?;

        let mut found = Warnings::new();
        found.extend(resolved_warnings.iter());
        let mut migrated_as = Vec::with_capacity(split.units.len());
        for unit in &split.units {
            match self.client.upsert_ingress(&render(unit)).await {
                Ok(()) => migrated_as.push(format!("{INGRESS_KIND}/{}", unit.name)),
                Err(e) => {
                    warn!(
                        "Failed to write Ingress {}/{}: {}",
                        unit.namespace, unit.name, e
                    );
                    found.push(warnings::ERROR_CREATING_INGRESS_RESOURCES);
                    state.errors.push(attribute(e.into()));
                }
            }
        }

        let tcp = tcp_ports::write_tcp_ports(self.client, &tcp_ports, &alb_ids, self.config.mode).await;
        migrated_as.extend(tcp.migrated_as);
        found.extend(tcp.warnings.iter());
        state.errors.extend(tcp.errors.into_iter().map(attribute));

        info!(
            "✅ Migrated Ingress {}/{} into {} resources",
            config.namespace,
            config.name,
            migrated_as.len()
        );
        Ok(MigratedResource {
            kind: INGRESS_KIND.to_string(),
            name: config.name.clone(),
            namespace: config.namespace.clone(),
            migrated_as,
            warnings: found.into_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::IngressSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn ingress(namespace: &str, name: &str, annotations: &[(&str, &str)], class: Option<&str>) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..ObjectMeta::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: class.map(str::to_string),
                ..IngressSpec::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_skip_rules() {
        assert_eq!(
            skip_reason(&ingress(KUBE_SYSTEM, "alb-health", &[], None), MigrationMode::Production),
            Some(SkipReason::SystemResource)
        );
        assert_eq!(
            skip_reason(&ingress("default", "alb-health", &[], None), MigrationMode::Production),
            None
        );
        assert_eq!(
            skip_reason(&ingress("default", "cafe", &[], Some("test")), MigrationMode::Production),
            Some(SkipReason::AlreadyMigrated)
        );
        assert_eq!(
            skip_reason(
                &ingress("default", "cafe", &[(INGRESS_CLASS_ANNOTATION, "public-iks-k8s-nginx")], None),
                MigrationMode::Production
            ),
            Some(SkipReason::AlreadyMigrated)
        );

        let private = ingress("default", "cafe", &[(annotations::ALB_ID, "private-cr1-alb1")], None);
        assert_eq!(
            skip_reason(&private, MigrationMode::Test),
            Some(SkipReason::PrivateAlbInTestMode)
        );
        assert_eq!(skip_reason(&private, MigrationMode::TestWithPrivate), None);
    }
}
