//! # Configuration Resolver
//!
//! Turns one legacy Ingress into an [`IngressConfig`]: one [`Server`] per rule,
//! one [`Location`] per path, each carrying the settings that the legacy
//! annotations define for its backend service.
//!
//! Resolution is all-or-nothing per resource. Every irrecoverable problem is
//! collected so the caller can report all of them at once, and nothing is
//! returned for a resource that has any.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use tracing::{info, warn};

use super::appid;
use super::model::{
    IngressConfig, Location, LocationAnnotations, ProxySsl, Server, ServerAnnotations,
    ServicePort, TcpPortConfig, TcpPortRequest, TlsEntry,
};
use super::secrets;
use super::warnings::{self, Warnings};
use crate::annotations::parsers::{self, AppIdAuth, LocationModifier};
use crate::annotations::table::collect_location_settings;
use crate::annotations::{self, parse_entries, unsupported_warnings, Scope, ScopedValues};
use crate::client::ClusterClient;
use crate::config::{MigrationMode, RunConfig};
use crate::constants::{PRIVATE_INGRESS_CLASS, PUBLIC_INGRESS_CLASS, TEST_INGRESS_CLASS};
use crate::error::{AnnotationError, ResourceError};

/// Resolved source resource together with its cross-resource data
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: IngressConfig,
    pub tcp_ports: TcpPortRequest,
    /// Raw `ALB-ID` value, `;`-separated
    pub alb_ids: String,
    pub warnings: Warnings,
}

type ValueParser = fn(&str) -> Result<(Scope, String), AnnotationError>;

/// Header annotations and the nginx directive each line becomes
const HEADER_BLOCKS: &[(&str, &str)] = &[
    (annotations::PROXY_ADD_HEADERS, "proxy_set_header"),
    (annotations::RESPONSE_ADD_HEADERS, "more_set_headers"),
    (annotations::RESPONSE_REMOVE_HEADERS, "more_clear_headers"),
];

fn annotation_error(annotation: &'static str) -> impl Fn(AnnotationError) -> ResourceError {
    move |source| ResourceError::Annotation { annotation, source }
}

/// Ingress class of the generated resources
///
/// # Errors
///
/// [`ResourceError::PrivateAlbInTestMode`] for a private ALB in `test` mode; such resources are skipped before resolving.
pub fn ingress_class(mode: MigrationMode, alb_ids: &str) -> Result<&'static str, ResourceError> {
    let private = alb_ids.contains("private");
    match (mode, private) {
        (MigrationMode::Test, true) => Err(ResourceError::PrivateAlbInTestMode),
        (MigrationMode::Test | MigrationMode::TestWithPrivate, _) => Ok(TEST_INGRESS_CLASS),
        (MigrationMode::Production, true) => Ok(PRIVATE_INGRESS_CLASS),
        (MigrationMode::Production, false) => Ok(PUBLIC_INGRESS_CLASS),
    }
}

fn service_backend(backend: &IngressBackend, path: &str) -> Result<(String, ServicePort), ResourceError> {
    let unsupported = || ResourceError::UnsupportedBackend {
        path: path.to_string(),
    };
    let service = backend.service.as_ref().ok_or_else(unsupported)?;
    let port = service.port.as_ref().ok_or_else(unsupported)?;
    let port = match (port.number, port.name.as_ref()) {
        (Some(number), _) => ServicePort::Number(number),
        (None, Some(name)) => ServicePort::Name(name.clone()),
        (None, None) => return Err(unsupported()),
    };
    Ok((service.name.clone(), port))
}

/// Backend service names in order of first appearance, the default backend last
fn backend_services(ingress: &Ingress) -> Vec<String> {
    let Some(spec) = ingress.spec.as_ref() else {
        return Vec::new();
    };
    let from_rules = spec
        .rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter())
        .filter_map(|path| path.backend.service.as_ref());
    let from_default = spec
        .default_backend
        .iter()
        .filter_map(|backend| backend.service.as_ref());

    let mut services: Vec<String> = Vec::new();
    for service in from_rules.chain(from_default) {
        if !services.contains(&service.name) {
            services.push(service.name.clone());
        }
    }
    services
}

/// Everything the legacy annotations say about one resource
#[derive(Default)]
struct ParsedAnnotations {
    location_settings: crate::annotations::table::RuleOutcome,
    redirect_to_https: bool,
    snippets: BTreeMap<String, Vec<String>>,
    server_snippet: Vec<String>,
    proxy_ssl: BTreeMap<String, ProxySsl>,
    mutual_auth_secret: Option<String>,
    appid: BTreeMap<String, AppIdAuth>,
    auth_urls_enabled: bool,
    modifiers: BTreeMap<String, LocationModifier>,
    tcp_ports: TcpPortRequest,
}

struct AnnotationResolver<'a> {
    client: &'a dyn ClusterClient,
    run: &'a RunConfig,
    namespace: &'a str,
    annotations: &'a BTreeMap<String, String>,
    services: Vec<String>,
    warnings: Warnings,
    errors: Vec<ResourceError>,
}

impl<'a> AnnotationResolver<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn entries<T>(
        &mut self,
        annotation: &'static str,
        parse: fn(&str) -> Result<(Scope, T), AnnotationError>,
    ) -> ScopedValues<T> {
        let Some(value) = self.get(annotation) else {
            return ScopedValues::new();
        };
        match parse_entries(value, parse) {
            Ok(values) => values,
            Err(e) => {
                self.errors.push(annotation_error(annotation)(e));
                ScopedValues::new()
            }
        }
    }

    fn location_snippets(&mut self) -> BTreeMap<String, Vec<String>> {
        let Some(value) = self.get(annotations::LOCATION_SNIPPETS) else {
            return BTreeMap::new();
        };
        match parsers::parse_location_snippets(value) {
            Ok(snippets) => self
                .services
                .iter()
                .filter_map(|service| snippets.get(service).map(|s| (service.clone(), s.clone())))
                .collect(),
            Err(e) => {
                self.errors
                    .push(annotation_error(annotations::LOCATION_SNIPPETS)(e));
                BTreeMap::new()
            }
        }
    }

    async fn proxy_ssl(&mut self) -> BTreeMap<String, ProxySsl> {
        let entries = self.entries(annotations::SSL_SERVICES, parsers::parse_ssl_service);
        let mut resolved = BTreeMap::new();
        for (service, ssl) in entries.named() {
            let mut secret = String::new();
            if !ssl.secret.is_empty() {
                match secrets::canonicalize(self.client, &ssl.secret, self.namespace).await {
                    Ok((found, found_warnings)) => {
                        let namespace = found.metadata.namespace.unwrap_or_default();
                        secret = format!("{namespace}/{}", ssl.secret);
                        self.warnings.extend(found_warnings);
                    }
                    Err(e) => {
                        warn!(
                            "Could not prepare ssl-services secret {} of service {}: {}",
                            ssl.secret, service, e
                        );
                        self.errors.push(e);
                        continue;
                    }
                }
            }
            resolved.insert(
                service.to_string(),
                ProxySsl {
                    secret,
                    verify_depth: ssl.verify_depth,
                    name: ssl.name.clone(),
                    verify: "on",
                },
            );
        }
        resolved
    }

    async fn mutual_auth(&mut self) -> Option<String> {
        let value = self.get(annotations::MUTUAL_AUTH)?;
        let auth = match parsers::parse_mutual_auth(value) {
            Ok(auth) => auth,
            Err(e) => {
                self.errors.push(annotation_error(annotations::MUTUAL_AUTH)(e));
                return None;
            }
        };
        if !auth.is_set() {
            return None;
        }
        if auth.port != "443" {
            self.warnings.push(warnings::MUTUAL_AUTH_CUSTOM_PORT);
        }
        match secrets::lookup_secret(self.client, &auth.secret_name, self.namespace).await {
            Ok(secret) => Some(format!(
                "{}/{}",
                secret.metadata.namespace.unwrap_or_default(),
                auth.secret_name
            )),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn header_blocks(&mut self, snippets: &mut BTreeMap<String, Vec<String>>) {
        for &(annotation, directive) in HEADER_BLOCKS {
            let Some(value) = self.get(annotation) else {
                continue;
            };
            match parsers::parse_header_blocks(value) {
                Ok(blocks) => {
                    for (service, lines) in blocks {
                        snippets
                            .entry(service)
                            .or_default()
                            .extend(lines.iter().map(|line| format!("{directive} {line}")));
                    }
                }
                Err(e) => self.errors.push(annotation_error(annotation)(e)),
            }
        }
    }

    fn location_modifiers(&mut self) -> BTreeMap<String, LocationModifier> {
        let modifiers: BTreeMap<String, LocationModifier> = self
            .entries(annotations::LOCATION_MODIFIER, parsers::parse_location_modifier)
            .named()
            .map(|(service, modifier)| (service.to_string(), *modifier))
            .collect();
        if modifiers.is_empty() {
            return modifiers;
        }

        let unsupported = modifiers.values().find(|m| {
            matches!(
                m,
                LocationModifier::CaseSensitiveRegex | LocationModifier::PrefixPriority
            )
        });
        if let Some(modifier) = unsupported {
            self.errors.push(ResourceError::UnsupportedLocationModifier(
                modifier.as_str().to_string(),
            ));
            self.warnings.push(warnings::LOCATION_MODIFIER_GENERIC);
        } else if !self.run.enhancements_enabled
            && modifiers.values().any(|m| *m == LocationModifier::Exact)
        {
            self.errors.push(ResourceError::ExactModifierUnavailable);
            self.warnings.push(warnings::LOCATION_MODIFIER_GENERIC);
        }
        self.warnings.push(warnings::LOCATION_MODIFIER);
        modifiers
    }

    fn keepalive(&mut self, server_snippet: &mut Vec<String>, snippets: &mut BTreeMap<String, Vec<String>>) {
        let rules: [(&'static str, &str, ValueParser); 2] = [
            (
                annotations::KEEPALIVE_REQUESTS,
                "keepalive_requests",
                parsers::parse_keepalive_requests,
            ),
            (
                annotations::KEEPALIVE_TIMEOUT,
                "keepalive_timeout",
                parsers::parse_keepalive_timeout,
            ),
        ];
        for (annotation, directive, parse) in rules {
            let values = self.entries(annotation, parse);
            if let Some(value) = values.all() {
                server_snippet.push(format!("{directive} {value};"));
            }
            for (service, value) in values.named() {
                snippets
                    .entry(service.to_string())
                    .or_default()
                    .push(format!("{directive} {value};"));
            }
        }
    }

    fn tcp_ports(&mut self) -> TcpPortRequest {
        let Some(value) = self.get(annotations::TCP_PORTS) else {
            return TcpPortRequest::new();
        };
        match parsers::parse_tcp_ports(value) {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| {
                    (
                        entry.ingress_port,
                        TcpPortConfig {
                            service_name: entry.service_name,
                            namespace: self.namespace.to_string(),
                            service_port: entry.service_port,
                        },
                    )
                })
                .collect(),
            Err(e) => {
                self.errors.push(annotation_error(annotations::TCP_PORTS)(e));
                TcpPortRequest::new()
            }
        }
    }

    async fn resolve(&mut self) -> ParsedAnnotations {
        let mut snippets = self.location_snippets();
        let mut server_snippet = self
            .get(annotations::SERVER_SNIPPETS)
            .map(parsers::parse_server_snippets)
            .unwrap_or_default();

        let location_settings = collect_location_settings(self.annotations);
        self.warnings.extend(location_settings.warnings.iter().copied());
        for (annotation, e) in &location_settings.errors {
            self.errors.push(annotation_error(*annotation)(e.clone()));
        }

        let redirect_to_https = self
            .get(annotations::REDIRECT_TO_HTTPS)
            .is_some_and(|value| value.to_lowercase() == "true");

        let proxy_ssl = self.proxy_ssl().await;
        let mutual_auth_secret = self.mutual_auth().await;

        let appid: BTreeMap<String, AppIdAuth> = self
            .entries(annotations::APPID_AUTH, parsers::parse_appid_auth)
            .named()
            .map(|(service, auth)| (service.to_string(), auth.clone()))
            .collect();
        let mut auth_urls_enabled = true;
        if !appid.is_empty() {
            self.warnings.push(warnings::APPID_ENABLE_ADDON);
            self.warnings.push(warnings::APPID_ADD_CALLBACKS);
            if appid::inject_auth_snippets(&mut snippets, &appid) {
                self.warnings.push(warnings::APPID_CONFIG_SNIPPET_CONFLICT);
                auth_urls_enabled = false;
            }
        }
        if appid.values().any(|auth| auth.namespace != self.namespace) {
            self.warnings.push(warnings::APPID_DIFFERENT_NAMESPACE);
        }

        if let Some(value) = self.get(annotations::LARGE_CLIENT_HEADER_BUFFERS) {
            match parsers::parse_large_client_header_buffers(value) {
                Ok(buffers) => {
                    server_snippet.push(format!("large_client_header_buffers {buffers};"));
                }
                Err(e) => self
                    .errors
                    .push(annotation_error(annotations::LARGE_CLIENT_HEADER_BUFFERS)(e)),
            }
        }

        self.header_blocks(&mut snippets);
        let modifiers = self.location_modifiers();
        self.keepalive(&mut server_snippet, &mut snippets);
        let tcp_ports = self.tcp_ports();

        ParsedAnnotations {
            location_settings,
            redirect_to_https,
            snippets,
            server_snippet,
            proxy_ssl,
            mutual_auth_secret,
            appid,
            auth_urls_enabled,
            modifiers,
            tcp_ports,
        }
    }
}

impl ParsedAnnotations {
    fn location(
        &self,
        run: &RunConfig,
        path: &str,
        service_name: String,
        service_port: ServicePort,
        path_type: Option<&str>,
    ) -> Location {
        let mut annotations = LocationAnnotations {
            redirect_to_https: self.redirect_to_https,
            ..LocationAnnotations::default()
        };
        self.location_settings.apply_to(&service_name, &mut annotations);
        annotations.location_snippet = self.snippets.get(&service_name).cloned().unwrap_or_default();
        annotations.proxy_ssl = self.proxy_ssl.get(&service_name).cloned();
        if self.auth_urls_enabled {
            if let Some(auth) = self.appid.get(&service_name) {
                annotations.auth_url = appid::auth_url(auth);
                annotations.auth_signin = appid::signin_url(auth).unwrap_or_default();
            }
        }

        let modifier = self.modifiers.get(&service_name).copied();
        annotations.use_regex = modifier == Some(LocationModifier::CaseInsensitiveRegex);
        let path_type = if !run.enhancements_enabled {
            None
        } else if modifier == Some(LocationModifier::Exact) {
            Some("Exact".to_string())
        } else {
            path_type.map(str::to_string)
        };

        Location {
            path: if path.is_empty() { "/" } else { path }.to_string(),
            path_type,
            service_name,
            service_port,
            annotations,
        }
    }

    fn server_annotations(&self) -> ServerAnnotations {
        ServerAnnotations {
            server_snippet: self.server_snippet.clone(),
            mutual_auth_secret: self.mutual_auth_secret.clone(),
        }
    }
}

fn build_servers(
    ingress: &Ingress,
    parsed: &ParsedAnnotations,
    run: &RunConfig,
) -> Result<Vec<Server>, ResourceError> {
    let Some(spec) = ingress.spec.as_ref() else {
        return Ok(Vec::new());
    };
    let default_backend = spec
        .default_backend
        .as_ref()
        .map(|backend| service_backend(backend, "/"))
        .transpose()?;

    let rules = spec.rules.as_deref().unwrap_or_default();
    let mut servers = Vec::with_capacity(rules.len().max(1));
    for rule in rules {
        let host = rule.host.clone().unwrap_or_default();
        if host.is_empty() {
            return Err(ResourceError::EmptyRuleHost);
        }

        let mut locations = Vec::new();
        for path in rule.http.iter().flat_map(|http| http.paths.iter()) {
            let path_str = path.path.as_deref().unwrap_or_default();
            let (service, port) = service_backend(&path.backend, path_str)?;
            locations.push(parsed.location(run, path_str, service, port, Some(&path.path_type)));
        }

        let has_root = locations.iter().any(|location| location.path == "/");
        if let (false, Some((service, port))) = (has_root, default_backend.as_ref()) {
            locations.push(parsed.location(run, "/", service.clone(), port.clone(), None));
        }

        servers.push(Server {
            host,
            locations,
            annotations: parsed.server_annotations(),
        });
    }

    if rules.is_empty() {
        if let Some((service, port)) = default_backend {
            servers.push(Server {
                host: String::new(),
                locations: vec![parsed.location(run, "/", service, port, None)],
                annotations: parsed.server_annotations(),
            });
        }
    }
    Ok(servers)
}

/// Resolve one legacy Ingress
///
/// # Errors
///
/// Every irrecoverable problem found in the resource.
pub async fn resolve(
    client: &dyn ClusterClient,
    ingress: &Ingress,
    run: &RunConfig,
) -> Result<Resolved, Vec<ResourceError>> {
    let name = ingress.metadata.name.clone().unwrap_or_default();
    let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
    let source_annotations = ingress.metadata.annotations.clone().unwrap_or_default();
    info!("Resolving Ingress {}/{}", namespace, name);

    let mut warnings = Warnings::new();
    warnings.extend(unsupported_warnings(&source_annotations));

    let alb_ids = source_annotations
        .get(annotations::ALB_ID)
        .cloned()
        .unwrap_or_default();
    let class = ingress_class(run.mode, &alb_ids).map_err(|e| vec![e])?;
    if !alb_ids.is_empty() {
        warnings.push(warnings::ALB_SELECTION);
    }

    let mut resolver = AnnotationResolver {
        client,
        run,
        namespace: &namespace,
        annotations: &source_annotations,
        services: backend_services(ingress),
        warnings,
        errors: Vec::new(),
    };
    let parsed = resolver.resolve().await;
    let AnnotationResolver {
        warnings, errors, ..
    } = resolver;
    if !errors.is_empty() {
        warn!(
            "Ingress {}/{} cannot be migrated ({} errors)",
            namespace,
            name,
            errors.len()
        );
        return Err(errors);
    }

    let servers = build_servers(ingress, &parsed, run).map_err(|e| vec![e])?;
    let tls = ingress
        .spec
        .iter()
        .flat_map(|spec| spec.tls.iter().flatten())
        .map(|tls| TlsEntry {
            hosts: tls.hosts.clone().unwrap_or_default(),
            secret_name: tls.secret_name.clone().unwrap_or_default(),
        })
        .collect();

    if !warnings.is_empty() {
        info!(
            "Ingress {}/{} resolved with {} warnings",
            namespace,
            name,
            warnings.len()
        );
    }
    Ok(Resolved {
        config: IngressConfig {
            name,
            namespace,
            labels: ingress.metadata.labels.clone().unwrap_or_default(),
            tls,
            ingress_class: class.to_string(),
            servers,
        },
        tcp_ports: parsed.tcp_ports,
        alb_ids,
        warnings,
    })
}
