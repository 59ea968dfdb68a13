//! # Migration Status Ledger
//!
//! Cross-run record of what was migrated, stored as a ConfigMap in
//! `kube-system`:
//!
//! | Key | Content |
//! |-----|---------|
//! | `schema-version` | format version of this record |
//! | `last-updated-timestamp` | RFC 3339 time of the last write |
//! | `migrated-resources` | JSON list of [`MigratedResource`] |
//! | `subdomain-map` | JSON object, original host to test host |
//! | `migration-mode` | mode every write so far was made with |
//!
//! Records written before the schema version existed carry no
//! `schema-version` key and are read as version 1.
//!
//! [`merge`] holds all the rules; [`StatusLedger`] only moves the record
//! between the cluster and [`LedgerState`].

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{info, warn};

use super::model::MigratedResource;
use crate::client::ClusterClient;
use crate::config::MigrationMode;
use crate::constants::{
    KUBE_SYSTEM, LAST_UPDATED_TIMESTAMP_KEY, MIGRATED_RESOURCES_KEY, MIGRATION_MODE_KEY,
    MIGRATION_STATUS_CONFIG_MAP_NAME, SCHEMA_VERSION_KEY, SUBDOMAIN_MAP_KEY,
};
use crate::error::RunError;

pub const SCHEMA_VERSION: u32 = 1;

/// Decoded ledger record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub mode: Option<MigrationMode>,
    pub entries: Vec<MigratedResource>,
    pub subdomains: BTreeMap<String, String>,
    pub last_updated: Option<String>,
}

/// Fold one write into `existing`
///
/// Entries are appended and the subdomain delta is merged key by key.
///
/// # Errors
///
/// [`RunError::ModeMismatch`] when `existing` was written with another mode.
pub fn merge(
    existing: LedgerState,
    mode: MigrationMode,
    entries: Vec<MigratedResource>,
    subdomain_delta: &BTreeMap<String, String>,
) -> Result<LedgerState, RunError> {
    if let Some(persisted) = existing.mode {
        if persisted != mode {
            return Err(RunError::ModeMismatch {
                persisted,
                requested: mode,
            });
        }
    }
    let mut merged = existing;
    merged.mode = Some(mode);
    merged.entries.extend(entries);
    merged.subdomains.extend(
        subdomain_delta
            .iter()
            .map(|(host, test_host)| (host.clone(), test_host.clone())),
    );
    Ok(merged)
}

fn corrupt(key: &'static str) -> impl Fn(serde_json::Error) -> RunError {
    move |e| RunError::CorruptLedger {
        key,
        reason: e.to_string(),
    }
}

/// Read a ledger ConfigMap's data
///
/// # Errors
///
/// [`RunError::CorruptLedger`] for undecodable values, [`RunError::UnsupportedLedgerVersion`] for newer records.
pub fn decode(data: &BTreeMap<String, String>) -> Result<LedgerState, RunError> {
    let version = match data.get(SCHEMA_VERSION_KEY) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|e| RunError::CorruptLedger {
                key: SCHEMA_VERSION_KEY,
                reason: e.to_string(),
            })?,
        None => 1,
    };
    if version > SCHEMA_VERSION {
        return Err(RunError::UnsupportedLedgerVersion(version));
    }

    let non_empty = |key: &str| data.get(key).map(String::as_str).filter(|v| !v.is_empty());
    let entries: Vec<MigratedResource> = non_empty(MIGRATED_RESOURCES_KEY)
        .map(serde_json::from_str)
        .transpose()
        .map_err(corrupt(MIGRATED_RESOURCES_KEY))?
        .unwrap_or_default();
    let subdomains: BTreeMap<String, String> = non_empty(SUBDOMAIN_MAP_KEY)
        .map(serde_json::from_str)
        .transpose()
        .map_err(corrupt(SUBDOMAIN_MAP_KEY))?
        .unwrap_or_default();
    let mode = non_empty(MIGRATION_MODE_KEY)
        .map(str::parse::<MigrationMode>)
        .transpose()
        .map_err(|e| RunError::CorruptLedger {
            key: MIGRATION_MODE_KEY,
            reason: e.to_string(),
        })?;

    Ok(LedgerState {
        mode,
        entries,
        subdomains,
        last_updated: data.get(LAST_UPDATED_TIMESTAMP_KEY).cloned(),
    })
}

/// ConfigMap data for `state`, stamped with `now`
///
/// # Errors
///
/// [`RunError::CorruptLedger`] when a value cannot be serialized.
pub fn encode(state: &LedgerState, now: DateTime<Utc>) -> Result<BTreeMap<String, String>, RunError> {
    let mut data = BTreeMap::new();
    data.insert(SCHEMA_VERSION_KEY.to_string(), SCHEMA_VERSION.to_string());
    data.insert(
        LAST_UPDATED_TIMESTAMP_KEY.to_string(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    data.insert(
        MIGRATED_RESOURCES_KEY.to_string(),
        serde_json::to_string(&state.entries).map_err(corrupt(MIGRATED_RESOURCES_KEY))?,
    );
    data.insert(
        SUBDOMAIN_MAP_KEY.to_string(),
        serde_json::to_string(&state.subdomains).map_err(corrupt(SUBDOMAIN_MAP_KEY))?,
    );
    if let Some(mode) = state.mode {
        data.insert(MIGRATION_MODE_KEY.to_string(), mode.as_str().to_string());
    }
    Ok(data)
}

/// Ledger stored through a [`ClusterClient`]
pub struct StatusLedger<'a> {
    client: &'a dyn ClusterClient,
}

impl std::fmt::Debug for StatusLedger<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusLedger").finish_non_exhaustive()
    }
}

impl<'a> StatusLedger<'a> {
    #[must_use]
    pub fn new(client: &'a dyn ClusterClient) -> Self {
        Self { client }
    }

    /// Current record; empty when none exists
    ///
    /// # Errors
    ///
    /// Client failures other than not-found, and undecodable records.
    pub async fn read(&self) -> Result<LedgerState, RunError> {
        match self
            .client
            .get_config_map(KUBE_SYSTEM, MIGRATION_STATUS_CONFIG_MAP_NAME)
            .await
        {
            Ok(config_map) => decode(&config_map.data.unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(LedgerState::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `entries` and merge `subdomain_delta` into the record
    ///
    /// # Errors
    ///
    /// [`RunError::ModeMismatch`] without touching the record, or a read/write failure.
    pub async fn record(
        &self,
        mode: MigrationMode,
        entries: Vec<MigratedResource>,
        subdomain_delta: &BTreeMap<String, String>,
    ) -> Result<LedgerState, RunError> {
        let existing = self.read().await?;
        let added = entries.len();
        let merged = merge(existing, mode, entries, subdomain_delta).inspect_err(|e| {
            warn!("Not updating the migration status: {}", e);
        })?;

        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(MIGRATION_STATUS_CONFIG_MAP_NAME.to_string()),
                namespace: Some(KUBE_SYSTEM.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(encode(&merged, Utc::now())?),
            ..ConfigMap::default()
        };
        self.client.upsert_config_map(&config_map).await?;
        info!(
            "✅ Recorded {} migrated resources in {}/{}",
            added, KUBE_SYSTEM, MIGRATION_STATUS_CONFIG_MAP_NAME
        );
        Ok(merged)
    }

    /// Remove the record; a missing record is not an error
    ///
    /// # Errors
    ///
    /// Client failures other than not-found.
    pub async fn delete(&self) -> Result<(), RunError> {
        match self
            .client
            .delete_config_map(KUBE_SYSTEM, MIGRATION_STATUS_CONFIG_MAP_NAME)
            .await
        {
            Ok(()) => {
                info!("Deleted previous migration status");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
