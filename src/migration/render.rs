//! # Renderer
//!
//! Builds the community `networking.k8s.io/v1` Ingress for one unit.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

use super::model::{
    LocationAnnotations, LocationUnit, ServerUnit, ServicePort, SingleIngressConfig, UnitKind,
};
use crate::constants::INGRESS_CLASS_ANNOTATION;

const NGINX_PREFIX: &str = "nginx.ingress.kubernetes.io/";

const DEFAULT_PATH_TYPE: &str = "ImplementationSpecific";

/// Community annotation map; empty values are never written
#[derive(Default)]
struct CommunityAnnotations(BTreeMap<String, String>);

impl CommunityAnnotations {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.insert(format!("{NGINX_PREFIX}{key}"), value);
        }
    }

    fn flag(&mut self, key: &str, enabled: bool) {
        if enabled {
            self.set(key, "true");
        }
    }
}

fn location_annotations(annotations: &LocationAnnotations) -> CommunityAnnotations {
    let mut out = CommunityAnnotations::default();
    out.set("rewrite-target", annotations.rewrite.as_str());
    out.flag("force-ssl-redirect", annotations.redirect_to_https);
    out.set("configuration-snippet", annotations.location_snippet.join("\n"));
    out.set("proxy-body-size", annotations.client_max_body_size.as_str());
    out.set("proxy-buffering", annotations.proxy_buffering.as_str());
    if let Some(buffers) = &annotations.proxy_buffers {
        out.set("proxy-buffer-size", buffers.size.as_str());
        out.set("proxy-buffers-number", buffers.number.as_str());
    }
    out.set("proxy-read-timeout", annotations.proxy_read_timeout.as_str());
    out.set("proxy-connect-timeout", annotations.proxy_connect_timeout.as_str());

    if let Some(ssl) = &annotations.proxy_ssl {
        out.set("backend-protocol", "HTTPS");
        out.set("proxy-ssl-secret", ssl.secret.as_str());
        out.set("proxy-ssl-verify-depth", ssl.verify_depth.to_string());
        out.set("proxy-ssl-name", ssl.name.as_str());
        out.set("proxy-ssl-verify", ssl.verify);
    }

    if let Some(next) = &annotations.next_upstream {
        out.set("proxy-next-upstream", next.conditions.as_str());
        out.set("proxy-next-upstream-timeout", next.timeout.as_str());
        out.set("proxy-next-upstream-tries", next.tries.as_str());
    }

    if let Some(cookie) = &annotations.sticky_cookie {
        out.set("affinity", "cookie");
        out.set("session-cookie-name", cookie.name.as_str());
        out.set("session-cookie-expires", cookie.expires.as_str());
        out.set("session-cookie-max-age", cookie.expires.as_str());
        out.set("session-cookie-path", cookie.path.as_str());
    }

    out.set("auth-url", annotations.auth_url.as_str());
    out.set("auth-signin", annotations.auth_signin.as_str());
    out.flag("use-regex", annotations.use_regex);
    out
}

fn backend_port(port: &ServicePort) -> ServiceBackendPort {
    match port {
        ServicePort::Number(number) => ServiceBackendPort {
            number: Some(*number),
            name: None,
        },
        ServicePort::Name(name) => ServiceBackendPort {
            number: None,
            name: Some(name.clone()),
        },
    }
}

fn location_spec(unit: &LocationUnit) -> IngressSpec {
    let host = Some(unit.host.clone()).filter(|h| !h.is_empty());
    let path = HTTPIngressPath {
        path: Some(unit.path.clone()),
        path_type: unit
            .path_type
            .clone()
            .unwrap_or_else(|| DEFAULT_PATH_TYPE.to_string()),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: unit.service_name.clone(),
                port: Some(backend_port(&unit.service_port)),
            }),
            resource: None,
        },
    };
    let tls = unit.tls_secret.as_ref().map(|secret| {
        vec![IngressTLS {
            hosts: host.clone().map(|h| vec![h]),
            secret_name: Some(secret.clone()),
        }]
    });
    IngressSpec {
        rules: Some(vec![IngressRule {
            host,
            http: Some(HTTPIngressRuleValue { paths: vec![path] }),
        }]),
        tls,
        ..IngressSpec::default()
    }
}

fn server_annotations(unit: &ServerUnit) -> CommunityAnnotations {
    let mut out = CommunityAnnotations::default();
    out.set("server-snippet", unit.annotations.server_snippet.join("\n"));
    if let Some(secret) = &unit.annotations.mutual_auth_secret {
        out.set("auth-tls-secret", secret.as_str());
        out.set("auth-tls-verify-client", "on");
    }
    out
}

fn server_spec(unit: &ServerUnit) -> IngressSpec {
    let rules = unit
        .hosts
        .iter()
        .filter(|host| !host.is_empty())
        .map(|host| IngressRule {
            host: Some(host.clone()),
            http: None,
        })
        .collect::<Vec<_>>();
    let tls = unit
        .tls
        .iter()
        .map(|group| IngressTLS {
            hosts: Some(group.hosts.clone()),
            secret_name: Some(group.secret_name.clone()),
        })
        .collect::<Vec<_>>();
    IngressSpec {
        rules: Some(rules).filter(|r| !r.is_empty()),
        tls: Some(tls).filter(|t| !t.is_empty()),
        ..IngressSpec::default()
    }
}

/// Community Ingress for `unit`
#[must_use]
pub fn render(unit: &SingleIngressConfig) -> Ingress {
    let (mut annotations, spec) = match &unit.kind {
        UnitKind::Location(location) => (
            location_annotations(&location.annotations),
            location_spec(location),
        ),
        UnitKind::Server(server) => (server_annotations(server), server_spec(server)),
    };
    annotations
        .0
        .insert(INGRESS_CLASS_ANNOTATION.to_string(), unit.ingress_class.clone());
    debug!(
        "Rendered Ingress {}/{} with {} annotations",
        unit.namespace,
        unit.name,
        annotations.0.len()
    );

    Ingress {
        metadata: ObjectMeta {
            name: Some(unit.name.clone()),
            namespace: Some(unit.namespace.clone()),
            labels: Some(unit.labels.clone()).filter(|l| !l.is_empty()),
            annotations: Some(annotations.0),
            ..ObjectMeta::default()
        },
        spec: Some(spec),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::parsers::StickyCookie;
    use crate::migration::model::{ProxySsl, ServerAnnotations, TlsGroup};

    fn annotation<'a>(ingress: &'a Ingress, key: &str) -> Option<&'a str> {
        ingress
            .metadata
            .annotations
            .as_ref()?
            .get(&format!("{NGINX_PREFIX}{key}"))
            .map(String::as_str)
    }

    fn location(annotations: LocationAnnotations) -> SingleIngressConfig {
        SingleIngressConfig {
            name: "cafe-tea-svc-tea".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            ingress_class: "public-iks-k8s-nginx".to_string(),
            kind: UnitKind::Location(LocationUnit {
                host: "cafe.example.com".to_string(),
                tls_secret: Some("cafe-tls".to_string()),
                path: "/tea".to_string(),
                path_type: None,
                service_name: "tea-svc".to_string(),
                service_port: ServicePort::Name("http".to_string()),
                annotations,
            }),
        }
    }

    #[test]
    fn test_location_unit_renders_one_path() {
        let ingress = render(&location(LocationAnnotations {
            rewrite: "/leaves/".to_string(),
            location_snippet: vec!["a;".to_string(), "b;".to_string()],
            proxy_read_timeout: "5".to_string(),
            ..LocationAnnotations::default()
        }));

        assert_eq!(annotation(&ingress, "rewrite-target"), Some("/leaves/"));
        assert_eq!(annotation(&ingress, "configuration-snippet"), Some("a;\nb;"));
        assert_eq!(annotation(&ingress, "proxy-read-timeout"), Some("5"));
        assert_eq!(annotation(&ingress, "force-ssl-redirect"), None);
        assert_eq!(
            ingress.metadata.annotations.as_ref().unwrap()[INGRESS_CLASS_ANNOTATION],
            "public-iks-k8s-nginx"
        );

        let spec = ingress.spec.unwrap();
        let rule = &spec.rules.unwrap()[0];
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path_type, DEFAULT_PATH_TYPE);
        let port = path.backend.service.as_ref().unwrap().port.as_ref().unwrap();
        assert_eq!(port.name.as_deref(), Some("http"));
        assert_eq!(spec.tls.unwrap()[0].secret_name.as_deref(), Some("cafe-tls"));
    }

    #[test]
    fn test_proxy_ssl_and_sticky_cookie_annotations() {
        let ingress = render(&location(LocationAnnotations {
            proxy_ssl: Some(ProxySsl {
                secret: "default/ssl".to_string(),
                verify_depth: 3,
                name: String::new(),
                verify: "on",
            }),
            sticky_cookie: Some(StickyCookie {
                name: "route".to_string(),
                expires: "4200".to_string(),
                path: "/".to_string(),
                hash: "sha1".to_string(),
                secure: true,
                http_only: true,
            }),
            ..LocationAnnotations::default()
        }));

        assert_eq!(annotation(&ingress, "backend-protocol"), Some("HTTPS"));
        assert_eq!(annotation(&ingress, "proxy-ssl-verify-depth"), Some("3"));
        assert_eq!(annotation(&ingress, "proxy-ssl-name"), None);
        assert_eq!(annotation(&ingress, "affinity"), Some("cookie"));
        assert_eq!(annotation(&ingress, "session-cookie-max-age"), Some("4200"));
    }

    #[test]
    fn test_server_unit_renders_hosts_and_mutual_auth() {
        let unit = SingleIngressConfig {
            name: "cafe-server".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::from([("app".to_string(), "cafe".to_string())]),
            ingress_class: "test".to_string(),
            kind: UnitKind::Server(ServerUnit {
                hosts: vec!["a.example.com".to_string(), "b.example.com".to_string()],
                tls: vec![TlsGroup {
                    secret_name: "cafe-tls".to_string(),
                    hosts: vec!["a.example.com".to_string()],
                }],
                annotations: ServerAnnotations {
                    server_snippet: vec!["keepalive_requests 100;".to_string()],
                    mutual_auth_secret: Some("default/ca".to_string()),
                },
            }),
        };
        let ingress = render(&unit);

        assert_eq!(annotation(&ingress, "auth-tls-secret"), Some("default/ca"));
        assert_eq!(annotation(&ingress, "auth-tls-verify-client"), Some("on"));
        assert_eq!(annotation(&ingress, "server-snippet"), Some("keepalive_requests 100;"));
        let spec = ingress.spec.unwrap();
        assert_eq!(spec.rules.unwrap().len(), 2);
        assert_eq!(spec.tls.unwrap().len(), 1);
        assert_eq!(ingress.metadata.labels.unwrap()["app"], "cafe");
    }
}
