//! Fixtures shared by the migration integration tests
//!
//! Builders for the legacy objects a cluster holds before a migration and a
//! deterministic [`RandomSource`] for test hostnames.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;

use ingress_migrator::client::MemoryCluster;
use ingress_migrator::config::{MigrationMode, RunConfig};
use ingress_migrator::constants::{IKS_CONFIG_MAP_NAME, K8S_CONFIG_MAP_NAME, KUBE_SYSTEM};
use ingress_migrator::error::RunError;
use ingress_migrator::migration::subdomain::RandomSource;

pub const TEST_DOMAIN: &str = "test.example.net";
pub const TEST_SECRET: &str = "test-tls";

/// Returns `prefix` truncated to the requested length on every call
#[derive(Debug)]
pub struct FixedRandom(pub &'static str);

impl RandomSource for FixedRandom {
    fn random_string(&mut self, len: usize) -> Result<String, RunError> {
        Ok(self.0.chars().take(len).collect())
    }
}

pub fn production() -> RunConfig {
    RunConfig::default()
}

pub fn test_mode(mode: MigrationMode) -> RunConfig {
    RunConfig {
        mode,
        test_domain: TEST_DOMAIN.to_string(),
        test_secret: TEST_SECRET.to_string(),
        ..RunConfig::default()
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(KUBE_SYSTEM.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(string_map(data)),
        ..ConfigMap::default()
    }
}

pub fn secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Secret::default()
    }
}

/// Cluster with both controller ConfigMaps in place
pub fn cluster_with_controllers(legacy: &[(&str, &str)]) -> MemoryCluster {
    MemoryCluster::new()
        .with_config_map(config_map(K8S_CONFIG_MAP_NAME, &[("ssl-redirect", "true")]))
        .with_config_map(config_map(IKS_CONFIG_MAP_NAME, legacy))
}

/// `(host, [(path, service)])` rules
pub type Rules<'a> = &'a [(&'a str, &'a [(&'a str, &'a str)])];

pub fn ingress(
    namespace: &str,
    name: &str,
    annotations: &[(&str, &str)],
    rules: Rules<'_>,
    tls: &[(&[&str], &str)],
) -> Ingress {
    let rules = rules
        .iter()
        .map(|(host, paths)| IngressRule {
            host: Some((*host).to_string()),
            http: Some(HTTPIngressRuleValue {
                paths: paths
                    .iter()
                    .map(|(path, service)| HTTPIngressPath {
                        path: Some((*path).to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: (*service).to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(80),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    })
                    .collect(),
            }),
        })
        .collect();
    let tls = tls
        .iter()
        .map(|(hosts, secret)| IngressTLS {
            hosts: Some(hosts.iter().map(|h| (*h).to_string()).collect()),
            secret_name: Some((*secret).to_string()),
        })
        .collect::<Vec<_>>();

    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(string_map(annotations)),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            rules: Some(rules),
            tls: Some(tls).filter(|t| !t.is_empty()),
            ..IngressSpec::default()
        }),
        status: None,
    }
}

/// The usual coffee/tea shop on one host
pub fn cafe(annotations: &[(&str, &str)]) -> Ingress {
    ingress(
        "default",
        "cafe",
        annotations,
        &[(
            "cafe.example.com",
            &[("/coffee", "coffee-svc"), ("/tea", "tea-svc")],
        )],
        &[(&["cafe.example.com"], "cafe-tls")],
    )
}

pub fn annotation<'a>(ingress: &'a Ingress, key: &str) -> Option<&'a str> {
    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

pub fn rule_hosts(ingress: &Ingress) -> Vec<String> {
    ingress
        .spec
        .iter()
        .flat_map(|spec| spec.rules.iter().flatten())
        .filter_map(|rule| rule.host.clone())
        .collect()
}

pub fn secret_data(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| String::from_utf8_lossy(&value.0).into_owned())
}
