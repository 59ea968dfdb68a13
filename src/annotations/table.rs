//! # Location Rule Table
//!
//! Declarative mapping from a per-service legacy annotation to the location
//! setting it produces.
//!
//! Every rule is processed the same way: split the value into entries, parse
//! each entry into a [`Scope`] and a [`LocationSetting`], and record the
//! warnings the rule raises. The resolver then applies `All` settings before
//! `Named` ones so a service-specific entry always wins.

use std::collections::BTreeMap;

use super::parsers::{self, NextUpstream, ProxyBuffers, StickyCookie};
use super::{Scope, REWRITE_PATH};
use crate::error::AnnotationError;
use crate::migration::model::LocationAnnotations;
use crate::migration::warnings;

/// One parsed per-service setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationSetting {
    Rewrite(String),
    ProxyReadTimeout(String),
    ProxyConnectTimeout(String),
    ProxyBuffering(String),
    ProxyBuffers(ProxyBuffers),
    ClientMaxBodySize(String),
    NextUpstream(NextUpstream),
    StickyCookie(StickyCookie),
}

impl LocationSetting {
    pub fn apply(&self, annotations: &mut LocationAnnotations) {
        match self {
            LocationSetting::Rewrite(v) => annotations.rewrite.clone_from(v),
            LocationSetting::ProxyReadTimeout(v) => annotations.proxy_read_timeout.clone_from(v),
            LocationSetting::ProxyConnectTimeout(v) => {
                annotations.proxy_connect_timeout.clone_from(v);
            }
            LocationSetting::ProxyBuffering(v) => annotations.proxy_buffering.clone_from(v),
            LocationSetting::ProxyBuffers(v) => annotations.proxy_buffers = Some(v.clone()),
            LocationSetting::ClientMaxBodySize(v) => {
                annotations.client_max_body_size.clone_from(v);
            }
            LocationSetting::NextUpstream(v) => annotations.next_upstream = Some(v.clone()),
            LocationSetting::StickyCookie(v) => annotations.sticky_cookie = Some(v.clone()),
        }
    }

    /// Warnings raised by the parsed value itself
    #[must_use]
    pub fn warnings(&self) -> Vec<&'static str> {
        match self {
            LocationSetting::StickyCookie(cookie) => {
                let mut found = Vec::new();
                if !cookie.secure {
                    found.push(warnings::STICKY_COOKIE_NO_SECURE);
                }
                if !cookie.http_only {
                    found.push(warnings::STICKY_COOKIE_NO_HTTPONLY);
                }
                found
            }
            _ => Vec::new(),
        }
    }
}

type EntryParser = fn(&str) -> Result<(Scope, LocationSetting), AnnotationError>;

pub struct LocationRule {
    pub annotation: &'static str,
    pub parse: EntryParser,
    /// Raised whenever the annotation is present and non-empty
    pub presence_warning: Option<&'static str>,
}

fn rewrite(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_rewrite(entry).map(|(scope, v)| (scope, LocationSetting::Rewrite(v)))
}

fn proxy_read_timeout(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_proxy_timeout(entry)
        .map(|(scope, v)| (scope, LocationSetting::ProxyReadTimeout(v)))
}

fn proxy_connect_timeout(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_proxy_timeout(entry)
        .map(|(scope, v)| (scope, LocationSetting::ProxyConnectTimeout(v)))
}

fn proxy_buffering(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_proxy_buffering(entry)
        .map(|(scope, v)| (scope, LocationSetting::ProxyBuffering(v)))
}

fn proxy_buffers(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_proxy_buffers(entry).map(|(scope, v)| (scope, LocationSetting::ProxyBuffers(v)))
}

fn client_max_body_size(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_client_max_body_size(entry)
        .map(|(scope, v)| (scope, LocationSetting::ClientMaxBodySize(v)))
}

fn next_upstream(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_next_upstream(entry).map(|(scope, v)| (scope, LocationSetting::NextUpstream(v)))
}

fn sticky_cookie(entry: &str) -> Result<(Scope, LocationSetting), AnnotationError> {
    parsers::parse_sticky_cookie(entry).map(|(scope, v)| (scope, LocationSetting::StickyCookie(v)))
}

pub const LOCATION_RULES: &[LocationRule] = &[
    LocationRule {
        annotation: REWRITE_PATH,
        parse: rewrite,
        presence_warning: Some(warnings::REWRITES),
    },
    LocationRule {
        annotation: super::PROXY_READ_TIMEOUT,
        parse: proxy_read_timeout,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::PROXY_BUFFERING,
        parse: proxy_buffering,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::PROXY_BUFFERS,
        parse: proxy_buffers,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::CLIENT_MAX_BODY_SIZE,
        parse: client_max_body_size,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::PROXY_CONNECT_TIMEOUT,
        parse: proxy_connect_timeout,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::PROXY_NEXT_UPSTREAM_CONFIG,
        parse: next_upstream,
        presence_warning: None,
    },
    LocationRule {
        annotation: super::STICKY_COOKIE_SERVICES,
        parse: sticky_cookie,
        presence_warning: None,
    },
];

/// Result of running [`LOCATION_RULES`] over one resource
#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub settings: Vec<(Scope, LocationSetting)>,
    pub warnings: Vec<&'static str>,
    pub errors: Vec<(&'static str, AnnotationError)>,
}

impl RuleOutcome {
    /// Apply every setting relevant to `service`, `All` entries first
    pub fn apply_to(&self, service: &str, annotations: &mut LocationAnnotations) {
        let all = self.settings.iter().filter(|(scope, _)| *scope == Scope::All);
        let named = self
            .settings
            .iter()
            .filter(|(scope, _)| scope.service() == Some(service));
        for (_, setting) in all.chain(named) {
            setting.apply(annotations);
        }
    }
}

/// Run every rule whose annotation is present; a failing rule contributes an error and no settings
#[must_use]
pub fn collect_location_settings(annotations: &BTreeMap<String, String>) -> RuleOutcome {
    let mut outcome = RuleOutcome::default();
    for rule in LOCATION_RULES {
        let Some(value) = annotations.get(rule.annotation) else {
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }
        if let Some(warning) = rule.presence_warning {
            outcome.warnings.push(warning);
        }

        let parsed: Result<Vec<_>, _> = parsers::split_entries(value)
            .iter()
            .map(|entry| (rule.parse)(entry))
            .collect();
        match parsed {
            Ok(settings) => {
                for (_, setting) in &settings {
                    outcome.warnings.extend(setting.warnings());
                }
                outcome.settings.extend(settings);
            }
            Err(err) => outcome.errors.push((rule.annotation, err)),
        }
    }
    outcome
}
