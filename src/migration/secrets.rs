//! # Secret Canonicalizer
//!
//! Finds the secret referenced by `ssl-services` and adds the keys the
//! community controller expects, without touching existing keys.
//!
//! ## Lookup order
//!
//! 1. The namespace of the Ingress. In `default`, a reference secret redirects to `ibm-cert-store`.
//! 2. `default`, with the same redirect rule.
//! 3. `ibm-cert-store`.
//!
//! The first non-redirected hit wins.

use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use tracing::{debug, info, warn};

use super::warnings;
use crate::client::ClusterClient;
use crate::constants::{DEFAULT_NAMESPACE, REFERENCE_SECRET_KEY, SECURE_CERT_NAMESPACE};
use crate::error::{ClientError, ResourceError};

/// Legacy key and the community key it is copied to
const KEY_MAPPING: &[(&str, &str)] = &[
    ("trusted.crt", "ca.crt"),
    ("client.crt", "tls.crt"),
    ("client.key", "tls.key"),
];

fn is_reference_secret(secret: &Secret) -> bool {
    secret
        .data
        .as_ref()
        .is_some_and(|data| data.contains_key(REFERENCE_SECRET_KEY))
}

/// `Ok(None)` when the secret does not exist in `namespace`
async fn get_optional(
    client: &dyn ClusterClient,
    name: &str,
    namespace: &str,
    searched: &mut Vec<String>,
) -> Result<Option<Secret>, ClientError> {
    searched.push(namespace.to_string());
    match client.get_secret(namespace, name).await {
        Ok(secret) => Ok(Some(secret)),
        Err(e) if e.is_not_found() => {
            debug!("Secret {} not found in namespace {}", name, namespace);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Resolve a secret in `default`, following a reference into the secure namespace
async fn follow_reference(
    client: &dyn ClusterClient,
    name: &str,
    secret: Secret,
    searched: &mut Vec<String>,
) -> Result<Option<Secret>, ClientError> {
    if !is_reference_secret(&secret) {
        return Ok(Some(secret));
    }
    info!(
        "Secret {}/{} is a reference secret, checking namespace {}",
        DEFAULT_NAMESPACE, name, SECURE_CERT_NAMESPACE
    );
    get_optional(client, name, SECURE_CERT_NAMESPACE, searched).await
}

/// Find `name` starting from the Ingress namespace
///
/// # Errors
///
/// [`ResourceError::SecretNotFound`] when no namespace holds it, or the client error of a failed lookup.
pub async fn lookup_secret(
    client: &dyn ClusterClient,
    name: &str,
    namespace: &str,
) -> Result<Secret, ResourceError> {
    let mut searched = Vec::new();

    if let Some(secret) = get_optional(client, name, namespace, &mut searched).await? {
        if namespace != DEFAULT_NAMESPACE {
            return Ok(secret);
        }
        if let Some(secret) = follow_reference(client, name, secret, &mut searched).await? {
            return Ok(secret);
        }
    }

    if let Some(secret) = get_optional(client, name, DEFAULT_NAMESPACE, &mut searched).await? {
        if let Some(secret) = follow_reference(client, name, secret, &mut searched).await? {
            return Ok(secret);
        }
    }

    if let Some(secret) = get_optional(client, name, SECURE_CERT_NAMESPACE, &mut searched).await? {
        return Ok(secret);
    }

    warn!("Secret {} not found in namespaces {:?}", name, searched);
    Err(ResourceError::SecretNotFound {
        name: name.to_string(),
        searched,
    })
}

/// Copy legacy keys onto community keys that are still missing
///
/// Returns one warning per target key that already exists with different content.
pub fn copy_legacy_keys(secret: &mut Secret) -> Vec<String> {
    let namespace = secret.meta().namespace.clone().unwrap_or_default();
    let name = secret.meta().name.clone().unwrap_or_default();
    let Some(data) = secret.data.as_mut() else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (source, target) in KEY_MAPPING {
        let Some(value) = data.get(*source).cloned() else {
            continue;
        };
        match data.get(*target) {
            None => {
                data.insert((*target).to_string(), value);
            }
            Some(existing) if *existing != value => {
                warn!(
                    "Keys {} and {} of secret {}/{} differ, keeping {}",
                    source, target, namespace, name, target
                );
                found.push(warnings::ssl_services_secret(&namespace, &name, source, target));
            }
            Some(_) => {}
        }
    }
    found
}

/// Look up, normalize and write back the secret
///
/// # Errors
///
/// Lookup failures and a failed write back.
pub async fn canonicalize(
    client: &dyn ClusterClient,
    name: &str,
    namespace: &str,
) -> Result<(Secret, Vec<String>), ResourceError> {
    let mut secret = lookup_secret(client, name, namespace).await?;
    let found = copy_legacy_keys(&mut secret);
    client.update_secret(&secret).await?;
    info!(
        "✅ Canonicalized secret {}/{}",
        secret.meta().namespace.as_deref().unwrap_or_default(),
        name
    );
    Ok((secret, found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryCluster;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ingress_namespace_wins_outside_default() {
        let cluster = MemoryCluster::new()
            .with_secret(secret("cafe", "ssl", &[(REFERENCE_SECRET_KEY, "x")]))
            .with_secret(secret(SECURE_CERT_NAMESPACE, "ssl", &[]));
        let found = lookup_secret(&cluster, "ssl", "cafe").await.unwrap();
        assert_eq!(found.metadata.namespace.as_deref(), Some("cafe"));
    }

    #[tokio::test]
    async fn test_reference_secret_in_default_redirects() {
        let cluster = MemoryCluster::new()
            .with_secret(secret(DEFAULT_NAMESPACE, "ssl", &[(REFERENCE_SECRET_KEY, "x")]))
            .with_secret(secret(SECURE_CERT_NAMESPACE, "ssl", &[("trusted.crt", "ca")]));
        let found = lookup_secret(&cluster, "ssl", "cafe").await.unwrap();
        assert_eq!(found.metadata.namespace.as_deref(), Some(SECURE_CERT_NAMESPACE));
    }

    #[tokio::test]
    async fn test_not_found_lists_searched_namespaces() {
        let cluster = MemoryCluster::new();
        let err = lookup_secret(&cluster, "ssl", "cafe").await.unwrap_err();
        match err {
            ResourceError::SecretNotFound { searched, .. } => {
                assert_eq!(searched, vec!["cafe", DEFAULT_NAMESPACE, SECURE_CERT_NAMESPACE]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_copy_keeps_existing_target() {
        let mut s = secret(
            "cafe",
            "ssl",
            &[("trusted.crt", "new-ca"), ("ca.crt", "old-ca"), ("client.crt", "cert")],
        );
        let found = copy_legacy_keys(&mut s);

        let data = s.data.unwrap();
        assert_eq!(data["ca.crt"].0, b"old-ca".to_vec());
        assert_eq!(data["tls.crt"].0, b"cert".to_vec());
        assert!(!data.contains_key("tls.key"));
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("'trusted.crt' and 'ca.crt'"));
    }
}
