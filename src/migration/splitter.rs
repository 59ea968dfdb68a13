//! # Splitter
//!
//! Splits an [`IngressConfig`] into render-ready units: one resource per
//! (host, path) pair and a single `<ingress>-server` resource holding the
//! host-level settings of every host.
//!
//! In test modes every source host is replaced by a test hostname and every
//! TLS section uses the configured test secret.

use std::collections::BTreeMap;

use tracing::info;

use super::model::{
    IngressConfig, LocationUnit, ServerAnnotations, ServerUnit, SingleIngressConfig, TlsGroup,
    UnitKind,
};
use super::naming::UniqueNamer;
use super::subdomain::{self, RandomSource};
use crate::config::RunConfig;
use crate::error::RunError;

/// Output of [`split`]
#[derive(Debug, Clone, Default)]
pub struct Split {
    /// Location units in source order, the server unit last
    pub units: Vec<SingleIngressConfig>,
    /// Test hostnames assigned while splitting this resource
    pub assigned: BTreeMap<String, String>,
}

fn add_tls_host(groups: &mut Vec<TlsGroup>, secret: &str, host: &str) {
    match groups.iter_mut().find(|group| group.secret_name == secret) {
        Some(group) => {
            if !group.hosts.iter().any(|h| h == host) {
                group.hosts.push(host.to_string());
            }
        }
        None => groups.push(TlsGroup {
            secret_name: secret.to_string(),
            hosts: vec![host.to_string()],
        }),
    }
}

/// Split `config` into units
///
/// `subdomains` holds every test hostname known so far and receives the new
/// ones. A host that already has a test hostname keeps it.
///
/// # Errors
///
/// [`RunError::Randomness`] when a test hostname cannot be generated.
pub fn split(
    config: &IngressConfig,
    run: &RunConfig,
    namer: &mut UniqueNamer,
    subdomains: &mut BTreeMap<String, String>,
    random: &mut dyn RandomSource,
) -> Result<Split, RunError> {
    let server_unit_name = namer.server_name(&config.namespace, &config.name);

    let mut result = Split::default();
    let mut server = ServerUnit {
        hosts: Vec::new(),
        tls: Vec::new(),
        annotations: ServerAnnotations::default(),
    };

    for source in &config.servers {
        let (host, tls_secret) = if run.mode.is_test() {
            let test_host = match subdomains.get(&source.host) {
                Some(known) => known.clone(),
                None => {
                    let allocated =
                        subdomain::allocate(&run.test_domain, &source.host, subdomains, random)?;
                    info!(
                        "Generated test subdomain {} for host {}",
                        allocated, source.host
                    );
                    subdomains.insert(source.host.clone(), allocated.clone());
                    result.assigned.insert(source.host.clone(), allocated.clone());
                    allocated
                }
            };
            let secret = Some(run.test_secret.clone()).filter(|s| !s.is_empty());
            (test_host, secret)
        } else {
            (
                source.host.clone(),
                config.tls_secret(&source.host).map(str::to_string),
            )
        };

        for location in &source.locations {
            let name = namer.location_name(
                &config.namespace,
                &config.name,
                &location.service_name,
                &location.path,
            );
            result.units.push(SingleIngressConfig {
                name,
                namespace: config.namespace.clone(),
                labels: config.labels.clone(),
                ingress_class: config.ingress_class.clone(),
                kind: UnitKind::Location(LocationUnit {
                    host: host.clone(),
                    tls_secret: tls_secret.clone(),
                    path: location.path.clone(),
                    path_type: location.path_type.clone(),
                    service_name: location.service_name.clone(),
                    service_port: location.service_port.clone(),
                    annotations: location.annotations.clone(),
                }),
            });
        }

        if !server.hosts.contains(&host) {
            server.hosts.push(host.clone());
        }
        if let Some(secret) = tls_secret.as_deref() {
            add_tls_host(&mut server.tls, secret, &host);
        }
        server.annotations.clone_from(&source.annotations);
    }

    result.units.push(SingleIngressConfig {
        name: server_unit_name,
        namespace: config.namespace.clone(),
        labels: config.labels.clone(),
        ingress_class: config.ingress_class.clone(),
        kind: UnitKind::Server(server),
    });
    info!(
        "Split Ingress {}/{} into {} resources",
        config.namespace,
        config.name,
        result.units.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationMode;
    use crate::migration::model::{Location, LocationAnnotations, Server, ServicePort, TlsEntry};

    struct Counter(usize);

    impl RandomSource for Counter {
        fn random_string(&mut self, len: usize) -> Result<String, RunError> {
            self.0 += 1;
            Ok(format!("{:0>len$}", self.0))
        }
    }

    fn server(host: &str, paths: &[(&str, &str)], snippet: &str) -> Server {
        Server {
            host: host.to_string(),
            locations: paths
                .iter()
                .map(|(path, service)| Location {
                    path: path.to_string(),
                    path_type: None,
                    service_name: service.to_string(),
                    service_port: ServicePort::Number(80),
                    annotations: LocationAnnotations::default(),
                })
                .collect(),
            annotations: ServerAnnotations {
                server_snippet: vec![snippet.to_string()],
                mutual_auth_secret: None,
            },
        }
    }

    fn cafe() -> IngressConfig {
        IngressConfig {
            name: "cafe".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            tls: vec![TlsEntry {
                hosts: vec!["cafe.example.com".to_string(), "www.example.com".to_string()],
                secret_name: "cafe-tls".to_string(),
            }],
            ingress_class: "public-iks-k8s-nginx".to_string(),
            servers: vec![
                server("cafe.example.com", &[("/coffee", "coffee-svc"), ("/tea", "tea-svc")], "a"),
                server("www.example.com", &[("/", "tea-svc")], "a"),
                server("*.shop.example.com", &[("/", "tea-svc")], "a"),
            ],
        }
    }

    fn test_run() -> RunConfig {
        RunConfig {
            mode: MigrationMode::Test,
            test_domain: "test.example.net".to_string(),
            test_secret: "test-tls".to_string(),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_production_split_groups_tls_by_secret() {
        let run = RunConfig::default();
        let mut subdomains = BTreeMap::new();
        let split = split(&cafe(), &run, &mut UniqueNamer::new(), &mut subdomains, &mut Counter(0))
            .unwrap();

        let names: Vec<&str> = split.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cafe-coffee-svc-coffee",
                "cafe-tea-svc-tea",
                "cafe-tea-svc",
                "cafe-tea-svc-0",
                "cafe-server"
            ]
        );
        assert!(split.assigned.is_empty());

        let UnitKind::Server(server) = &split.units[4].kind else {
            panic!("last unit must be the server unit");
        };
        assert_eq!(server.hosts.len(), 3);
        assert_eq!(
            server.tls,
            vec![TlsGroup {
                secret_name: "cafe-tls".to_string(),
                hosts: vec!["cafe.example.com".to_string(), "www.example.com".to_string()],
            }]
        );

        let UnitKind::Location(wildcard) = &split.units[3].kind else {
            panic!("expected a location unit");
        };
        assert_eq!(wildcard.tls_secret, None);
    }

    #[test]
    fn test_test_mode_replaces_hosts_and_secrets() {
        let mut subdomains =
            BTreeMap::from([("*.old.example.com".to_string(), "*.wc-0.test.example.net".to_string())]);
        let split = split(
            &cafe(),
            &test_run(),
            &mut UniqueNamer::new(),
            &mut subdomains,
            &mut Counter(0),
        )
        .unwrap();

        assert_eq!(split.assigned["cafe.example.com"], "00000001.test.example.net");
        assert_eq!(split.assigned["*.shop.example.com"], "*.wc-1.test.example.net");
        assert_eq!(subdomains.len(), 4);

        let UnitKind::Server(server) = &split.units.last().unwrap().kind else {
            panic!("last unit must be the server unit");
        };
        assert_eq!(server.tls.len(), 1);
        assert_eq!(server.tls[0].secret_name, "test-tls");
        assert_eq!(server.tls[0].hosts.len(), 3);
    }

    #[test]
    fn test_known_host_keeps_its_test_hostname() {
        let mut subdomains = BTreeMap::from([(
            "cafe.example.com".to_string(),
            "persist1.test.example.net".to_string(),
        )]);
        let split = split(
            &cafe(),
            &test_run(),
            &mut UniqueNamer::new(),
            &mut subdomains,
            &mut Counter(0),
        )
        .unwrap();

        assert!(!split.assigned.contains_key("cafe.example.com"));
        let UnitKind::Location(first) = &split.units[0].kind else {
            panic!("expected a location unit");
        };
        assert_eq!(first.host, "persist1.test.example.net");
    }
}
