//! # Errors
//!
//! Error taxonomy of a migration run.
//!
//! - [`AnnotationError`]: a single annotation value could not be parsed
//! - [`ResourceError`]: one source resource cannot be migrated; the run continues
//! - [`RunError`]: a cross-resource consistency violation; the run stops
//! - [`ClientError`]: the cluster API collaborator failed
//!
//! Resource errors are wrapped into [`AttributedError`] before they are
//! aggregated so the final report can name the resource they belong to.

use thiserror::Error;

use crate::config::MigrationMode;

/// Failure of a pure annotation parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("invalid format '{value}': {reason}")]
    InvalidFormat { value: String, reason: &'static str },
    #[error("service name is mandatory: '{0}'")]
    MissingServiceName(String),
    #[error("invalid timeout '{0}', expected <number><unit> with unit ms, s, m, h or w")]
    InvalidTimeout(String),
    #[error("invalid duration '{0}', expected a sequence of <number><unit> with unit h, m or s")]
    InvalidDuration(String),
    #[error("proxy-ssl-verify-depth must be an integer between 1 and 10, got '{0}'")]
    InvalidVerifyDepth(String),
    #[error("invalid value specified for the requestType parameter: '{0}'")]
    InvalidRequestType(String),
    #[error("unknown location modifier '{0}'")]
    UnknownModifier(String),
    #[error("the same service name is used multiple times: '{0}'")]
    DuplicateService(String),
    #[error("annotation is present but has no content")]
    NoContent,
}

impl AnnotationError {
    pub(crate) fn format(value: &str, reason: &'static str) -> Self {
        AnnotationError::InvalidFormat {
            value: value.to_string(),
            reason,
        }
    }
}

/// Failure of the cluster API collaborator
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
}

impl ClientError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists { .. })
    }
}

/// Irrecoverable condition for one source resource
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("annotation '{annotation}': {source}")]
    Annotation {
        annotation: &'static str,
        #[source]
        source: AnnotationError,
    },
    #[error("host field of ingress rule is empty")]
    EmptyRuleHost,
    #[error("the ingress resource cannot be migrated due to the usage of the '{0}' location modifier which is not supported by the Kubernetes Ingress Controller")]
    UnsupportedLocationModifier(String),
    #[error("the '=' location modifier requires 'pathType: Exact', which needs Kubernetes 1.18 or newer; remove the 'ingress.bluemix.net/location-modifier' annotation from a copy of the resource or upgrade the cluster, then run the migration again")]
    ExactModifierUnavailable,
    #[error("secret '{name}' not found in namespaces {searched:?}")]
    SecretNotFound { name: String, searched: Vec<String> },
    #[error("ingress resource should have been skipped because it has an ALB-ID annotation with at least one private ALB ID and the migration is running in 'test' mode")]
    PrivateAlbInTestMode,
    #[error("backend of path '{path}' does not reference a service by name and port")]
    UnsupportedBackend { path: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Consistency violation that stops the whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Collision in the tcp-ports annotations of different Ingresses for the same ALB. ALB {alb_id}, Port {port}")]
    TcpPortCollision { alb_id: String, port: String },
    #[error("migration mode should not be changed from '{persisted}' to '{requested}' during a single run")]
    ModeMismatch {
        persisted: MigrationMode,
        requested: MigrationMode,
    },
    #[error("failed to generate random string for the test hostname: {0}")]
    Randomness(String),
    #[error("status ledger key '{key}' is unreadable: {reason}")]
    CorruptLedger { key: &'static str, reason: String },
    #[error("status ledger schema version {0} is not supported")]
    UnsupportedLedgerVersion(u32),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Resource error together with the identity of the resource it belongs to
#[derive(Debug, Error)]
#[error("{kind} {namespace}/{name}: {source}")]
pub struct AttributedError {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
    #[source]
    pub source: ResourceError,
}

impl AttributedError {
    #[must_use]
    pub fn new(kind: &'static str, namespace: &str, name: &str, source: ResourceError) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }
    }
}
