//! # Migration Model
//!
//! Intermediate representation between a legacy Ingress and the generated
//! community resources.
//!
//! ```text
//! Ingress ──resolve──▶ IngressConfig ──split──▶ [SingleIngressConfig] ──render──▶ [Ingress]
//!            │
//!            └──────▶ TcpPortRequest ──merge──▶ AlbSpecificData ──▶ TCP ConfigMaps
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::annotations::parsers::{NextUpstream, ProxyBuffers, StickyCookie};

/// Backend port, numeric or named
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServicePort {
    Number(i32),
    Name(String),
}

impl fmt::Display for ServicePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServicePort::Number(number) => write!(f, "{number}"),
            ServicePort::Name(name) => f.write_str(name),
        }
    }
}

/// Re-encryption towards the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySsl {
    /// `namespace/name` of the canonicalized secret, empty when none was given
    pub secret: String,
    pub verify_depth: u8,
    pub name: String,
    pub verify: &'static str,
}

/// Per-location settings, all optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationAnnotations {
    pub rewrite: String,
    pub redirect_to_https: bool,
    pub location_snippet: Vec<String>,
    pub client_max_body_size: String,
    pub proxy_buffering: String,
    pub proxy_buffers: Option<ProxyBuffers>,
    /// Seconds
    pub proxy_read_timeout: String,
    /// Seconds
    pub proxy_connect_timeout: String,
    pub proxy_ssl: Option<ProxySsl>,
    pub next_upstream: Option<NextUpstream>,
    pub sticky_cookie: Option<StickyCookie>,
    pub auth_url: String,
    pub auth_signin: String,
    pub use_regex: bool,
}

/// Host-level settings; identical for every server of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerAnnotations {
    pub server_snippet: Vec<String>,
    /// `namespace/name` of the client CA secret when mutual auth is set
    pub mutual_auth_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub path_type: Option<String>,
    pub service_name: String,
    pub service_port: ServicePort,
    pub annotations: LocationAnnotations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    pub locations: Vec<Location>,
    pub annotations: ServerAnnotations,
}

/// TLS entry of the source resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsEntry {
    pub hosts: Vec<String>,
    pub secret_name: String,
}

/// Resolved configuration of one source Ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressConfig {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub tls: Vec<TlsEntry>,
    pub ingress_class: String,
    pub servers: Vec<Server>,
}

impl IngressConfig {
    /// Secret of the first TLS entry listing exactly `host`
    #[must_use]
    pub fn tls_secret(&self, host: &str) -> Option<&str> {
        self.tls
            .iter()
            .find(|entry| entry.hosts.iter().any(|h| h == host))
            .map(|entry| entry.secret_name.as_str())
            .filter(|secret| !secret.is_empty())
    }

    /// Number of (host, path) pairs
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.servers.iter().map(|server| server.locations.len()).sum()
    }
}

/// Hosts sharing one TLS secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsGroup {
    pub secret_name: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationUnit {
    pub host: String,
    pub tls_secret: Option<String>,
    pub path: String,
    pub path_type: Option<String>,
    pub service_name: String,
    pub service_port: ServicePort,
    pub annotations: LocationAnnotations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerUnit {
    pub hosts: Vec<String>,
    pub tls: Vec<TlsGroup>,
    pub annotations: ServerAnnotations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Location(LocationUnit),
    Server(ServerUnit),
}

/// One render-ready target resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleIngressConfig {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub ingress_class: String,
    pub kind: UnitKind,
}

impl SingleIngressConfig {
    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self.kind, UnitKind::Server(_))
    }
}

/// TCP stream target of one ingress port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpPortConfig {
    pub service_name: String,
    pub namespace: String,
    pub service_port: String,
}

impl TcpPortConfig {
    /// Value format of the community TCP services ConfigMap
    #[must_use]
    pub fn stream_target(&self) -> String {
        format!("{}/{}:{}", self.namespace, self.service_name, self.service_port)
    }
}

/// TCP ports requested by one resource, keyed by ingress port
pub type TcpPortRequest = BTreeMap<String, TcpPortConfig>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbConfigData {
    pub tcp_ports: BTreeMap<String, TcpPortConfig>,
}

/// Run-scoped accumulation keyed by ALB id; `""` means no ALB was selected
pub type AlbSpecificData = BTreeMap<String, AlbConfigData>;

/// Ledger entry for one migrated source resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedResource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub migrated_as: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub warnings: Vec<String>,
}

/// Older records store empty lists as `null`
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrated_resource_json_field_names() {
        let entry = MigratedResource {
            kind: "Ingress".to_string(),
            name: "cafe".to_string(),
            namespace: "default".to_string(),
            migrated_as: vec!["Ingress/cafe-server".to_string()],
            warnings: vec![],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["migratedAs"][0], "Ingress/cafe-server");
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_tls_secret_matches_exact_host() {
        let config = IngressConfig {
            name: "cafe".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            tls: vec![TlsEntry {
                hosts: vec!["cafe.example.com".to_string()],
                secret_name: "cafe-tls".to_string(),
            }],
            ingress_class: "public-iks-k8s-nginx".to_string(),
            servers: vec![],
        };
        assert_eq!(config.tls_secret("cafe.example.com"), Some("cafe-tls"));
        assert_eq!(config.tls_secret("www.cafe.example.com"), None);
    }

    #[test]
    fn test_stream_target_format() {
        let target = TcpPortConfig {
            service_name: "coffee-svc".to_string(),
            namespace: "default".to_string(),
            service_port: "8080".to_string(),
        };
        assert_eq!(target.stream_target(), "default/coffee-svc:8080");
    }
}
