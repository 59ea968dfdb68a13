//! # Constants
//!
//! Well-known names shared by the migration components.
//!
//! The legacy controller and the community controller both read their
//! configuration from fixed objects in `kube-system`; those names, the ingress
//! classes and the keys of the status ledger live here.

/// Namespace holding controller-wide ConfigMaps and the status ledger
pub const KUBE_SYSTEM: &str = "kube-system";

/// Kind label used in ledger entries for ConfigMaps
pub const CONFIG_MAP_KIND: &str = "ConfigMap";

/// Kind label used in ledger entries for Ingresses
pub const INGRESS_KIND: &str = "Ingress";

/// ConfigMap configuring the legacy controller
pub const IKS_CONFIG_MAP_NAME: &str = "ibm-cloud-provider-ingress-cm";

/// ConfigMap configuring the community controller
pub const K8S_CONFIG_MAP_NAME: &str = "ibm-k8s-controller-config";

/// ConfigMap written instead of [`K8S_CONFIG_MAP_NAME`] in test modes
pub const TEST_K8S_CONFIG_MAP_NAME: &str = "ibm-k8s-controller-config-test";

/// Legacy ConfigMap keys holding the `;`-separated TCP port allowlists
pub const IKS_PUBLIC_PORTS_KEY: &str = "public-ports";
pub const IKS_PRIVATE_PORTS_KEY: &str = "private-ports";

// Status ledger record
pub const MIGRATION_STATUS_CONFIG_MAP_NAME: &str = "ibm-ingress-migration-status";
pub const LAST_UPDATED_TIMESTAMP_KEY: &str = "last-updated-timestamp";
pub const MIGRATED_RESOURCES_KEY: &str = "migrated-resources";
pub const SUBDOMAIN_MAP_KEY: &str = "subdomain-map";
pub const MIGRATION_MODE_KEY: &str = "migration-mode";
pub const SCHEMA_VERSION_KEY: &str = "schema-version";

/// Annotation selecting the controller that processes an Ingress
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Class processed by public community ALBs (production, no private ALB selected)
pub const PUBLIC_INGRESS_CLASS: &str = "public-iks-k8s-nginx";

/// Class processed by private community ALBs (production, private ALB selected)
pub const PRIVATE_INGRESS_CLASS: &str = "private-iks-k8s-nginx";

/// Class processed by the test ALB in test modes
pub const TEST_INGRESS_CLASS: &str = "test";

/// TCP stream ConfigMap used when no ALB was selected
pub const GENERIC_TCP_CONFIG_MAP_NAME: &str = "generic-k8s-ingress-tcp-ports";

/// Suffix of ALB-scoped TCP stream ConfigMaps (`<albID>-k8s-ingress-tcp-ports`)
pub const TCP_CONFIG_MAP_NAME_SUFFIX: &str = "-k8s-ingress-tcp-ports";

/// Namespace searched last for TLS secrets, and the target of reference secrets
pub const SECURE_CERT_NAMESPACE: &str = "ibm-cert-store";

/// Namespace searched second for TLS secrets
pub const DEFAULT_NAMESPACE: &str = "default";

/// Data key marking a secret as a pointer into [`SECURE_CERT_NAMESPACE`]
pub const REFERENCE_SECRET_KEY: &str = "referenceSecret";

/// Kubernetes object name limit
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Characters reserved for a `-N` collision suffix once a name is truncated
pub const NAME_SUFFIX_RESERVE: usize = 3;

/// Length of the random prefix of generated test hostnames
pub const TEST_HOST_PREFIX_LEN: usize = 8;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "ingress_migrator=info";

/// Legacy Ingresses that belong to the platform and are never migrated
pub const SKIPPED_SYSTEM_INGRESSES: &[&str] = &["alb-default-server", "alb-health", "k8s-alb-health"];

/// Ingress classes that mark a resource as already migrated
pub const SKIPPED_INGRESS_CLASSES: &[&str] =
    &[PUBLIC_INGRESS_CLASS, PRIVATE_INGRESS_CLASS, TEST_INGRESS_CLASS];
