//! # Legacy Annotations
//!
//! Keys, scoping and parsing of the `ingress.bluemix.net/*` annotation dialect.
//!
//! Most legacy annotations are a `;`-separated list of entries, each optionally
//! naming the backend service it applies to with `serviceName=<svc>`. An entry
//! without a service name applies to every backend of the resource; that case is
//! [`Scope::All`] rather than a sentinel service name.
//!
//! - [`parsers`]: pure string to typed value functions
//! - [`table`]: declarative rules for the per-service location settings

use std::collections::BTreeMap;

use crate::error::AnnotationError;
use crate::migration::warnings;

pub mod parsers;
pub mod table;

pub const PREFIX: &str = "ingress.bluemix.net/";

pub const ALB_ID: &str = "ingress.bluemix.net/ALB-ID";
pub const REWRITE_PATH: &str = "ingress.bluemix.net/rewrite-path";
pub const PROXY_READ_TIMEOUT: &str = "ingress.bluemix.net/proxy-read-timeout";
pub const PROXY_CONNECT_TIMEOUT: &str = "ingress.bluemix.net/proxy-connect-timeout";
pub const PROXY_BUFFERING: &str = "ingress.bluemix.net/proxy-buffering";
pub const PROXY_BUFFERS: &str = "ingress.bluemix.net/proxy-buffers";
pub const CLIENT_MAX_BODY_SIZE: &str = "ingress.bluemix.net/client-max-body-size";
pub const REDIRECT_TO_HTTPS: &str = "ingress.bluemix.net/redirect-to-https";
pub const SSL_SERVICES: &str = "ingress.bluemix.net/ssl-services";
pub const PROXY_NEXT_UPSTREAM_CONFIG: &str = "ingress.bluemix.net/proxy-next-upstream-config";
pub const STICKY_COOKIE_SERVICES: &str = "ingress.bluemix.net/sticky-cookie-services";
pub const MUTUAL_AUTH: &str = "ingress.bluemix.net/mutual-auth";
pub const APPID_AUTH: &str = "ingress.bluemix.net/appid-auth";
pub const LARGE_CLIENT_HEADER_BUFFERS: &str = "ingress.bluemix.net/large-client-header-buffers";
pub const PROXY_ADD_HEADERS: &str = "ingress.bluemix.net/proxy-add-headers";
pub const RESPONSE_ADD_HEADERS: &str = "ingress.bluemix.net/response-add-headers";
pub const RESPONSE_REMOVE_HEADERS: &str = "ingress.bluemix.net/response-remove-headers";
pub const LOCATION_MODIFIER: &str = "ingress.bluemix.net/location-modifier";
pub const LOCATION_SNIPPETS: &str = "ingress.bluemix.net/location-snippets";
pub const SERVER_SNIPPETS: &str = "ingress.bluemix.net/server-snippets";
pub const KEEPALIVE_REQUESTS: &str = "ingress.bluemix.net/keepalive-requests";
pub const KEEPALIVE_TIMEOUT: &str = "ingress.bluemix.net/keepalive-timeout";
pub const TCP_PORTS: &str = "ingress.bluemix.net/tcp-ports";

/// Legacy annotations with no community equivalent, and the warning each one raises
pub const UNSUPPORTED: &[(&str, &str)] = &[
    ("ingress.bluemix.net/custom-errors", warnings::CUSTOM_ERRORS),
    ("ingress.bluemix.net/custom-error-actions", warnings::CUSTOM_ERROR_ACTIONS),
    ("ingress.bluemix.net/upstream-max-fails", warnings::UPSTREAM_MAX_FAILS),
    ("ingress.bluemix.net/proxy-external-service", warnings::PROXY_EXTERNAL_SERVICE),
    ("ingress.bluemix.net/proxy-busy-buffers-size", warnings::PROXY_BUSY_BUFFERS_SIZE),
    ("ingress.bluemix.net/add-host-port", warnings::ADD_HOST_PORT),
    ("ingress.bluemix.net/iam-ui-auth", warnings::IAM_UI_AUTH),
    ("ingress.bluemix.net/upstream-keepalive", warnings::UPSTREAM_KEEPALIVE),
    ("ingress.bluemix.net/upstream-keepalive-timeout", warnings::UPSTREAM_KEEPALIVE_TIMEOUT),
    ("ingress.bluemix.net/upstream-fail-timeout", warnings::UPSTREAM_FAIL_TIMEOUT),
    ("ingress.bluemix.net/hsts", warnings::HSTS),
    ("ingress.bluemix.net/custom-port", warnings::CUSTOM_PORT),
];

/// Warnings for every unsupported annotation present, in table order
#[must_use]
pub fn unsupported_warnings(annotations: &BTreeMap<String, String>) -> Vec<&'static str> {
    UNSUPPORTED
        .iter()
        .filter(|(key, _)| annotations.contains_key(*key))
        .map(|(_, warning)| *warning)
        .collect()
}

/// Backends an annotation entry applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// No `serviceName=` given: every backend of the resource
    All,
    /// A single backend service
    Named(String),
}

impl Scope {
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Named(service) => Some(service),
        }
    }
}

/// Values indexed by [`Scope`]
///
/// A `Named` value overrides the `All` value for that service. Within one
/// scope the last inserted value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedValues<T> {
    all: Option<T>,
    named: BTreeMap<String, T>,
}

impl<T> Default for ScopedValues<T> {
    fn default() -> Self {
        Self {
            all: None,
            named: BTreeMap::new(),
        }
    }
}

impl<T> ScopedValues<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scope: Scope, value: T) {
        match scope {
            Scope::All => self.all = Some(value),
            Scope::Named(service) => {
                self.named.insert(service, value);
            }
        }
    }

    /// Value effective for `service`
    #[must_use]
    pub fn get(&self, service: &str) -> Option<&T> {
        self.named.get(service).or(self.all.as_ref())
    }

    #[must_use]
    pub fn all(&self) -> Option<&T> {
        self.all.as_ref()
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &T)> {
        self.named.iter().map(|(service, value)| (service.as_str(), value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_none() && self.named.is_empty()
    }

    /// Every stored value, the `All` value first
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.all.iter().chain(self.named.values())
    }
}

/// Parse every `;`-separated entry of an annotation value with `parse`
///
/// # Errors
///
/// Returns the first entry error.
pub fn parse_entries<T>(
    value: &str,
    parse: fn(&str) -> Result<(Scope, T), AnnotationError>,
) -> Result<ScopedValues<T>, AnnotationError> {
    let mut values = ScopedValues::new();
    for entry in parsers::split_entries(value) {
        let (scope, parsed) = parse(&entry)?;
        values.insert(scope, parsed);
    }
    Ok(values)
}
