//! # Resource Naming
//!
//! Names of generated Ingresses.
//!
//! A location unit is named `<ingress>-<service>-<path without non-alphanumerics>`,
//! lower-cased, without a trailing `-` and at most 253 characters long. Names
//! already handed out in the same namespace get a `-0`, `-1`, ... suffix; a
//! truncated name gives up the characters the suffix needs. The server unit
//! is named `<ingress>-server` and goes through the same collision handling.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::constants::{MAX_RESOURCE_NAME_LEN, NAME_SUFFIX_RESERVE};

/// Name of the single host-level resource generated for `ingress`
#[must_use]
pub fn server_name(ingress: &str) -> String {
    format!("{ingress}-server")
}

fn truncate(name: &str, len: usize) -> String {
    name.chars().take(len).collect()
}

/// Name before collision handling
#[must_use]
pub fn base_name(ingress: &str, service: &str, path: &str) -> String {
    let path: String = path.chars().filter(char::is_ascii_alphanumeric).collect();
    let name = format!("{ingress}-{service}-{path}").to_lowercase();
    let name = name.strip_suffix('-').unwrap_or(&name);
    truncate(name, MAX_RESOURCE_NAME_LEN)
}

/// Names handed out during one run, per namespace
#[derive(Debug, Default)]
pub struct UniqueNamer {
    used: BTreeMap<String, BTreeSet<String>>,
}

impl UniqueNamer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique name for the server unit of `ingress`
    ///
    /// `<ingress>-server` unless an earlier resource of the namespace already
    /// took it, in which case it gets a `-N` suffix like any location.
    pub fn server_name(&mut self, namespace: &str, ingress: &str) -> String {
        self.unique(namespace, truncate(&server_name(ingress), MAX_RESOURCE_NAME_LEN))
    }

    /// Unique name for a location of `ingress`
    pub fn location_name(&mut self, namespace: &str, ingress: &str, service: &str, path: &str) -> String {
        self.unique(namespace, base_name(ingress, service, path))
    }

    fn unique(&mut self, namespace: &str, base: String) -> String {
        let used = self.used.entry(namespace.to_string()).or_default();
        if used.insert(base.clone()) {
            return base;
        }

        let stem = if base.len() > MAX_RESOURCE_NAME_LEN - NAME_SUFFIX_RESERVE {
            truncate(&base, MAX_RESOURCE_NAME_LEN - NAME_SUFFIX_RESERVE)
        } else {
            base
        };
        let mut index = 0usize;
        loop {
            let suffix = format!("-{index}");
            let candidate = if stem.len() + suffix.len() > MAX_RESOURCE_NAME_LEN {
                format!("{}{suffix}", truncate(&stem, MAX_RESOURCE_NAME_LEN - suffix.len()))
            } else {
                format!("{stem}{suffix}")
            };
            if used.insert(candidate.clone()) {
                debug!("Name {} was taken, using {}", stem, candidate);
                return candidate;
            }
            index += 1;
        }
    }
}
