//! # Controller ConfigMap Migration
//!
//! Carries the global options of the legacy controller
//! (`ibm-cloud-provider-ingress-cm`) over to the community controller
//! (`ibm-k8s-controller-config`).
//!
//! Every legacy key is handled by one [`PARAMETERS`] entry; keys with no entry
//! produce a warning. In test modes the result goes to a separate
//! `ibm-k8s-controller-config-test` ConfigMap so the live controller is not
//! affected.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info, warn};

use super::model::MigratedResource;
use super::warnings::{self, Warnings};
use crate::annotations::parsers::parse_time_with_units;
use crate::client::ClusterClient;
use crate::config::MigrationMode;
use crate::constants::{
    CONFIG_MAP_KIND, IKS_CONFIG_MAP_NAME, IKS_PRIVATE_PORTS_KEY, IKS_PUBLIC_PORTS_KEY,
    K8S_CONFIG_MAP_NAME, KUBE_SYSTEM, TEST_K8S_CONFIG_MAP_NAME,
};
use crate::error::{AnnotationError, RunError};

/// Legacy keys that are dropped without a warning
const IGNORED_KEYS: &[&str] = &[
    IKS_PUBLIC_PORTS_KEY,
    IKS_PRIVATE_PORTS_KEY,
    "vts-status-zone-size",
    "ingress-resource-creation-rate",
    "ingress-resource-timeout",
];

/// What one legacy parameter turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped {
    Set(&'static str, String),
    Warn(&'static str),
    Nothing,
}

type Mapper = fn(&str, &BTreeMap<String, String>) -> Result<Mapped, AnnotationError>;

fn verbatim(key: &'static str) -> impl Fn(&str) -> Mapped {
    move |value| Mapped::Set(key, value.to_string())
}

fn ssl_ciphers(value: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    Ok(verbatim("ssl-ciphers")(value))
}

fn ssl_protocols(value: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    Ok(verbatim("ssl-protocols")(value))
}

fn keep_alive_requests(value: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    Ok(verbatim("keep-alive-requests")(value))
}

fn keep_alive(value: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    let seconds = parse_time_with_units(value)?;
    Ok(Mapped::Set("keep-alive", seconds.to_string()))
}

fn server_names_hash_bucket_size(
    value: &str,
    _: &BTreeMap<String, String>,
) -> Result<Mapped, AnnotationError> {
    Ok(verbatim("server-name-hash-bucket-size")(value))
}

fn server_names_hash_max_size(
    value: &str,
    _: &BTreeMap<String, String>,
) -> Result<Mapped, AnnotationError> {
    Ok(verbatim("server-name-hash-max-size")(value))
}

fn access_log_buffering(value: &str, legacy: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    if value != "true" {
        return Ok(Mapped::Nothing);
    }
    let params: Vec<String> = [("buffer", "buffer-size"), ("flush", "flush-interval")]
        .iter()
        .filter_map(|(param, key)| {
            legacy
                .get(*key)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{param}={v}"))
        })
        .collect();
    if params.is_empty() {
        return Ok(Mapped::Nothing);
    }
    Ok(Mapped::Set("access-log-params", params.join(",")))
}

/// Read through `access-log-buffering`
fn access_log_part(_: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    Ok(Mapped::Nothing)
}

fn ssl_dhparam_file(_: &str, _: &BTreeMap<String, String>) -> Result<Mapped, AnnotationError> {
    Ok(Mapped::Warn(warnings::SSL_DHPARAM_FILE))
}

pub const PARAMETERS: &[(&str, Mapper)] = &[
    ("ssl-ciphers", ssl_ciphers),
    ("keep-alive", keep_alive),
    ("keep-alive-requests", keep_alive_requests),
    ("ssl-protocols", ssl_protocols),
    ("ssl-dhparam-file", ssl_dhparam_file),
    ("access-log-buffering", access_log_buffering),
    ("buffer-size", access_log_part),
    ("flush-interval", access_log_part),
    ("server-names-hash-bucket-size", server_names_hash_bucket_size),
    ("server-names-hash-max-size", server_names_hash_max_size),
];

/// Translate the legacy data into community keys, collecting warnings
#[must_use]
pub fn translate(legacy: &BTreeMap<String, String>) -> (BTreeMap<String, String>, Warnings) {
    let mut data = BTreeMap::new();
    let mut found = Warnings::new();
    for (key, value) in legacy {
        if IGNORED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Some((_, mapper)) = PARAMETERS.iter().find(|(name, _)| name == key) else {
            warn!("ConfigMap parameter {} has no community equivalent", key);
            found.push(warnings::unsupported_cm_parameter(key));
            continue;
        };
        match mapper(value, legacy) {
            Ok(Mapped::Set(target, value)) if !value.is_empty() => {
                debug!("Mapped ConfigMap parameter {} to {}={}", key, target, value);
                data.insert(target.to_string(), value);
            }
            Ok(Mapped::Warn(warning)) => found.push(warning),
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to process ConfigMap parameter {}: {}", key, e);
                found.push(warnings::error_processing_cm_parameter(key));
            }
        }
    }
    (data, found)
}

/// Migrate the legacy controller ConfigMap
///
/// Returns `None` when the legacy ConfigMap does not exist.
///
/// # Errors
///
/// A missing community ConfigMap or a failed read or write.
pub async fn migrate_controller_config(
    client: &dyn ClusterClient,
    mode: MigrationMode,
) -> Result<Option<MigratedResource>, RunError> {
    info!("Migrating controller ConfigMap (mode: {})", mode);
    let mut community = client
        .get_config_map(KUBE_SYSTEM, K8S_CONFIG_MAP_NAME)
        .await
        .inspect_err(|e| warn!("Cannot read {}/{}: {}", KUBE_SYSTEM, K8S_CONFIG_MAP_NAME, e))?;

    let legacy = match client.get_config_map(KUBE_SYSTEM, IKS_CONFIG_MAP_NAME).await {
        Ok(config_map) => config_map.data.unwrap_or_default(),
        Err(e) if e.is_not_found() => {
            warn!(
                "{}/{} is not present on the cluster, skipping ConfigMap migration",
                KUBE_SYSTEM, IKS_CONFIG_MAP_NAME
            );
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let (translated, found) = translate(&legacy);
    community
        .data
        .get_or_insert_with(BTreeMap::new)
        .extend(translated);

    let target = if mode.is_test() {
        let test = ConfigMap {
            metadata: ObjectMeta {
                name: Some(TEST_K8S_CONFIG_MAP_NAME.to_string()),
                namespace: Some(KUBE_SYSTEM.to_string()),
                ..ObjectMeta::default()
            },
            data: community.data,
            ..ConfigMap::default()
        };
        client.upsert_config_map(&test).await?;
        TEST_K8S_CONFIG_MAP_NAME
    } else {
        client.update_config_map(&community).await?;
        K8S_CONFIG_MAP_NAME
    };
    info!("✅ Applied ConfigMap {}/{}", KUBE_SYSTEM, target);

    Ok(Some(MigratedResource {
        kind: CONFIG_MAP_KIND.to_string(),
        name: IKS_CONFIG_MAP_NAME.to_string(),
        namespace: KUBE_SYSTEM.to_string(),
        migrated_as: vec![format!("{CONFIG_MAP_KIND}/{target}")],
        warnings: found.into_vec(),
    }))
}
