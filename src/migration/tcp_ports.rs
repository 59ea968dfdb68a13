//! # TCP Stream ConfigMaps
//!
//! Writes the TCP ports requested by one resource into the ConfigMaps read by
//! the community controller's `--tcp-services-configmap` flag.
//!
//! Only ports listed in the legacy allowlist of the ALB are written:
//! `private-ports` for private ALBs, `public-ports` otherwise.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{info, warn};

use super::alb::{alb_keys, parse_alb_ids};
use super::model::TcpPortRequest;
use super::warnings::{self, Warnings};
use crate::client::ClusterClient;
use crate::config::MigrationMode;
use crate::constants::{
    CONFIG_MAP_KIND, GENERIC_TCP_CONFIG_MAP_NAME, IKS_CONFIG_MAP_NAME, IKS_PRIVATE_PORTS_KEY,
    IKS_PUBLIC_PORTS_KEY, KUBE_SYSTEM, TCP_CONFIG_MAP_NAME_SUFFIX,
};
use crate::error::{ClientError, ResourceError};

/// Result of writing one resource's TCP ports
#[derive(Debug, Default)]
pub struct TcpPortsOutcome {
    /// `ConfigMap/<name>` of every ConfigMap written
    pub migrated_as: Vec<String>,
    pub warnings: Warnings,
    pub errors: Vec<ResourceError>,
}

/// ConfigMap holding the TCP streams of `alb_id`
#[must_use]
pub fn config_map_name(alb_id: &str) -> String {
    if alb_id.is_empty() {
        GENERIC_TCP_CONFIG_MAP_NAME.to_string()
    } else {
        format!("{alb_id}{TCP_CONFIG_MAP_NAME_SUFFIX}")
    }
}

/// Allowlist key of the legacy ConfigMap for `alb_id`
#[must_use]
pub fn allowlist_key(alb_id: &str) -> &'static str {
    if alb_id.contains("private") {
        IKS_PRIVATE_PORTS_KEY
    } else {
        IKS_PUBLIC_PORTS_KEY
    }
}

/// Stream entries of `request` whose ingress port is in `allowlist`, plus the dropped ports
#[must_use]
pub fn stream_data(request: &TcpPortRequest, allowlist: &str) -> (BTreeMap<String, String>, Vec<String>) {
    let allowed: Vec<&str> = allowlist.split(';').map(str::trim).collect();
    let mut data = BTreeMap::new();
    let mut dropped = Vec::new();
    for (port, target) in request {
        if allowed.contains(&port.as_str()) {
            data.insert(port.clone(), target.stream_target());
        } else {
            dropped.push(port.clone());
        }
    }
    (data, dropped)
}

/// Create the ConfigMap with `data`, or merge `data` into the existing one
///
/// # Errors
///
/// Client failures other than not-found on the initial read.
pub async fn create_or_merge(
    client: &dyn ClusterClient,
    name: &str,
    data: BTreeMap<String, String>,
) -> Result<(), ClientError> {
    match client.get_config_map(KUBE_SYSTEM, name).await {
        Ok(mut existing) => {
            existing.data.get_or_insert_with(BTreeMap::new).extend(data);
            client.update_config_map(&existing).await
        }
        Err(e) if e.is_not_found() => {
            let config_map = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(KUBE_SYSTEM.to_string()),
                    ..ObjectMeta::default()
                },
                data: Some(data),
                ..ConfigMap::default()
            };
            client.create_config_map(&config_map).await
        }
        Err(e) => Err(e),
    }
}

fn placement_warning(mode: MigrationMode, with_alb_id: bool) -> &'static str {
    match (mode.is_test(), with_alb_id) {
        (false, true) => warnings::TCP_PORTS_WITH_ALB_ID,
        (false, false) => warnings::TCP_PORTS_WITHOUT_ALB_ID,
        (true, true) => warnings::TCP_PORTS_WITH_ALB_ID_TEST,
        (true, false) => warnings::TCP_PORTS_WITHOUT_ALB_ID_TEST,
    }
}

/// Write the TCP ports of one resource for every ALB it selects
pub async fn write_tcp_ports(
    client: &dyn ClusterClient,
    request: &TcpPortRequest,
    alb_id_list: &str,
    mode: MigrationMode,
) -> TcpPortsOutcome {
    let mut outcome = TcpPortsOutcome::default();
    if request.is_empty() {
        return outcome;
    }

    let legacy = match client.get_config_map(KUBE_SYSTEM, IKS_CONFIG_MAP_NAME).await {
        Ok(config_map) => config_map.data.unwrap_or_default(),
        Err(e) => {
            warn!(
                "Cannot read TCP port allowlists from {}/{}: {}",
                KUBE_SYSTEM, IKS_CONFIG_MAP_NAME, e
            );
            outcome.errors.push(e.into());
            return outcome;
        }
    };

    for alb_id in alb_keys(alb_id_list) {
        let key = allowlist_key(&alb_id);
        let allowlist = legacy.get(key).map(String::as_str).unwrap_or_default();
        let (data, dropped) = stream_data(request, allowlist);
        for port in &dropped {
            outcome
                .warnings
                .push(warnings::tcp_port_not_allowed(port, &alb_id, key));
        }
        if data.is_empty() {
            continue;
        }

        let name = config_map_name(&alb_id);
        match create_or_merge(client, &name, data).await {
            Ok(()) => {
                info!("✅ Wrote TCP streams to ConfigMap {}/{}", KUBE_SYSTEM, name);
                outcome.migrated_as.push(format!("{CONFIG_MAP_KIND}/{name}"));
            }
            Err(e) => {
                warn!("Failed to write ConfigMap {}/{}: {}", KUBE_SYSTEM, name, e);
                outcome.errors.push(e.into());
            }
        }
    }

    if !outcome.migrated_as.is_empty() {
        let with_alb_id = !parse_alb_ids(alb_id_list).is_empty();
        outcome.warnings.push(placement_warning(mode, with_alb_id));
    }
    outcome
}
