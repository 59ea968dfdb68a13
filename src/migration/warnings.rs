//! # Migration Warnings
//!
//! User-facing texts attached to ledger entries when something could not be
//! migrated one-to-one, and the [`Warnings`] list collecting them per resource.

use std::fmt;

pub const ALB_SELECTION: &str = "We assume you used the 'ingress.bluemix.net/ALB-ID' annotation to apply an Ingress resource to private ALBs only, therefore if the annotation contained at least one private ALB ID the generated resources have the 'private-iks-k8s-nginx' class. (By default in the Kubernetes Ingress implementation, Ingress resources with the 'public-iks-k8s-nginx' and 'private-iks-k8s-nginx' classes are processed by public and private ALBs, respectively.) If you used this annotation to apply an Ingress resource to only a select a group of ALBs: In the Kubernetes Ingress implementation, you can customize your ALB deployment with a specific Ingress class, and specify the same Ingress class in the Ingress resources. To customize ALB deployments, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#comm-customize-deploy";

pub const CUSTOM_ERRORS: &str = "Annotation 'ingress.bluemix.net/custom-errors' cannot be automatically migrated. To use custom errors with the community Ingress image, see https://kubernetes.github.io/ingress-nginx/user-guide/custom-errors/";

pub const CUSTOM_ERROR_ACTIONS: &str = "Annotation 'ingress.bluemix.net/custom-error-actions' cannot be automatically migrated. To use custom errors with the community Ingress image, see https://kubernetes.github.io/ingress-nginx/user-guide/custom-errors/";

pub const UPSTREAM_MAX_FAILS: &str = "Annotation 'ingress.bluemix.net/upstream-max-fails' cannot be automatically migrated. Currently, no equivalent option exists for the community Ingress image.";

pub const PROXY_EXTERNAL_SERVICE: &str = "Annotation 'ingress.bluemix.net/proxy-external-service' cannot be automatically migrated. To configure proxying external services in a configuration (location) snippet, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/annotations/#configuration-snippet. To replace proxying with a permanent redirect to external services, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/annotations/#permanent-redirect";

pub const PROXY_BUSY_BUFFERS_SIZE: &str = "Annotation 'ingress.bluemix.net/proxy-busy-buffers-size' cannot be automatically migrated. To configure the proxy buffer size with the community Ingress image, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/annotations/#proxy-buffer-size";

pub const ADD_HOST_PORT: &str = "Annotation 'ingress.bluemix.net/add-host-port' cannot be automatically migrated. To configure host headers in a server snippet, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/annotations/#server-snippet. To configure host headers as a configmap option, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/configmap/#proxy-set-headers";

pub const IAM_UI_AUTH: &str = "Annotation 'ingress.bluemix.net/iam-ui-auth' cannot be automatically migrated as there is no equivalent configuration available for the community Ingress image.";

pub const STICKY_COOKIE_NO_SECURE: &str = "Annotation 'ingress.bluemix.net/sticky-cookie-services' does not include the 'secure' parameter. However, in the community Ingress implementation, sticky cookies must always be secure and the 'Secure' attribute is added to cookies by default. For more info about session affinity, see https://kubernetes.github.io/ingress-nginx/examples/affinity/cookie/";

pub const STICKY_COOKIE_NO_HTTPONLY: &str = "Annotation 'ingress.bluemix.net/sticky-cookie-services' does not include the 'HttpOnly' parameter. However, in the community Ingress implementation, sticky cookies must always be HTTP only and the 'HttpOnly' attribute is added to cookies by default. For more info about session affinity, see https://kubernetes.github.io/ingress-nginx/examples/affinity/cookie/";

pub const MUTUAL_AUTH_CUSTOM_PORT: &str = "Value of the 'port' parameter in annotation 'ingress.bluemix.net/mutual-auth' configuration is other than 443. In the community Ingress implementation, mutual authentication cannot be applied to custom ports. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/annotations/#client-certificate-authentication";

pub const TCP_PORTS_WITH_ALB_ID: &str = "Annotation 'ingress.bluemix.net/tcp-ports': In the Kubernetes Ingress implementation, TCP ports and services for each ALB ID are migrated to TCP ConfigMaps that are named in the format '<ALB-ID>-k8s-ingress-tcp-ports'. You must specify the ConfigMap for an ALB by adding the 'tcp-services-configmap=<ALB-ID>-k8s-ingress-tcp-ports' field to that ALB's deployment. For more info, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#comm-customize-deploy";

pub const TCP_PORTS_WITHOUT_ALB_ID: &str = "Annotation 'ingress.bluemix.net/tcp-ports': In the Kubernetes Ingress implementation, TCP ports and services are migrated to a TCP ConfigMap, 'generic-k8s-ingress-tcp-ports'. You must specify the ConfigMap in the 'tcp-services-configmap=generic-k8s-ingress-tcp-ports' field in your ALB deployments. For more info, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#comm-customize-deploy";

pub const TCP_PORTS_WITH_ALB_ID_TEST: &str = "Annotation 'ingress.bluemix.net/tcp-ports': In the Kubernetes Ingress implementation, TCP ports and services for each ALB ID are migrated to TCP ConfigMaps that are named in the format '<ALB-ID>-k8s-ingress-tcp-ports'. You must specify the ConfigMap in your test ALB deployment by running 'kubectl edit deployment public-ingress-migrator -n kube-system' then append '--tcp-services-configmap=<ALB-ID>-k8s-ingress-tcp-ports' to the argument list. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/exposing-tcp-udp-services";

pub const TCP_PORTS_WITHOUT_ALB_ID_TEST: &str = "Annotation 'ingress.bluemix.net/tcp-ports': In the Kubernetes Ingress implementation, TCP ports and services are migrated to a TCP ConfigMap, 'generic-k8s-ingress-tcp-ports'. You must specify the ConfigMap in your test ALB deployment by running 'kubectl edit deployment public-ingress-migrator -n kube-system' then append '--tcp-services-configmap=generic-k8s-ingress-tcp-ports' to the argument list. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/exposing-tcp-udp-services";

pub const UPSTREAM_KEEPALIVE: &str = "Annotation 'ingress.bluemix.net/upstream-keepalive' cannot be automatically migrated. To configure the maximum number of idle keepalive connections to an upstream server, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/configmap/#upstream-keepalive-connections";

pub const UPSTREAM_KEEPALIVE_TIMEOUT: &str = "Annotation 'ingress.bluemix.net/upstream-keepalive-timeout' cannot be automatically migrated. To configure the maximum time that a keepalive connection stays open, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/configmap/#upstream-keepalive-timeout";

pub const UPSTREAM_FAIL_TIMEOUT: &str = "Annotation 'ingress.bluemix.net/upstream-fail-timeout' cannot be automatically migrated. Currently, no equivalent option exists for the community Ingress image.";

pub const APPID_ENABLE_ADDON: &str = "Annotation 'ingress.bluemix.net/appid-auth': To authenticate apps with App ID, enable the ALB OAuth-Proxy cluster add-on by running 'ibmcloud ks cluster addon enable alb-oauth-proxy --cluster <ClusterID>'. To use the add-on, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#app-id-auth";

pub const APPID_ADD_CALLBACKS: &str = "The ALB OAuth-Proxy add-on features a new callback URL format. In order to make AppID authentication operational, you have to add new callback URLs for all AppID instances. Check out the documentation: https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#app-id-auth";

pub const APPID_DIFFERENT_NAMESPACE: &str = "The App ID service binding secret is in a different namespace than your Ingress resource. Unbind the App ID service instance from its current namespace by running 'ibmcloud ks cluster service unbind' and bind it to the namespace that your Ingress resource is in by running 'ibmcloud ks cluster service bind'. For more info about these commands, see https://cloud.ibm.com/docs/containers?topic=containers-cli-plugin-kubernetes-service-cli#cs_cluster_service_bind";

pub const APPID_CONFIG_SNIPPET_CONFLICT: &str = "The App ID authentication configuration cannot be automatically added to the configuration-snippet annotation. To manually adjust the configuration-snippet annotation, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#app-id-auth";

pub const REWRITES: &str = "Annotation 'ingress.bluemix.net/rewrite-path': In Kubernetes Ingress, the case-insensitive regular expression location modifier (~*) is set on all paths for a given host if any paths of the host has a rewrite target. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/ingress-path-matching/#example";

pub const LOCATION_MODIFIER: &str = "Annotation 'ingress.bluemix.net/location-modifier': In Kubernetes Ingress, the case-insensitive regular expression location modifier (~*) is set on all paths for a given host if any paths of the host has a rewrite target. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/ingress-path-matching/#example";

pub const HSTS: &str = "Annotation 'ingress.bluemix.net/hsts' annotation cannot be automatically migrated. In Kubernetes Ingress, a single set of ConfigMap parameters globally configures HSTS, and HSTS is enabled by default. To add max age and subdomain granularity, see https://www.nginx.com/blog/http-strict-transport-security-hsts-and-nginx/ To disable, set 'hsts: false' in the 'ibm-k8s-controller-config' ConfigMap. For more info, see https://kubernetes.github.io/ingress-nginx/user-guide/nginx-configuration/configmap/#hsts";

pub const CUSTOM_PORT: &str = "Annotation 'ingress.bluemix.net/custom-port' cannot be automatically migrated. To configure custom HTTP and HTTPS ports for an ALB, see https://cloud.ibm.com/docs/containers?topic=containers-comm-ingress-annotations#comm-customize-deploy";

pub const LOCATION_MODIFIER_GENERIC: &str = "Ingress resource cannot be migrated because values in the 'ingress.bluemix.net/location-modifier' annotation are not supported in the Kubernetes Ingress implementation. To automatically migrate the Ingress resource, create a copy of the resource file, remove the 'ingress.bluemix.net/location-modifier' annotation, apply the file in your cluster, and run the migration again.";

pub const SSL_DHPARAM_FILE: &str = "The 'ssl-dhparam' ConfigMap parameter cannot be migrated. To configure DH parameters for the Kubernetes Ingress image, see https://kubernetes.github.io/ingress-nginx/examples/customization/ssl-dh-param/";

pub const ERROR_CREATING_INGRESS_RESOURCES: &str =
    "Error(s) occurred while creating the migrated Ingress resources.";

#[must_use]
pub fn unsupported_cm_parameter(key: &str) -> String {
    format!("The '{key}' parameter could not be migrated.")
}

#[must_use]
pub fn error_processing_cm_parameter(key: &str) -> String {
    format!("The '{key}' parameter failed to process and could not be migrated.")
}

#[must_use]
pub fn ssl_services_secret(namespace: &str, name: &str, source: &str, target: &str) -> String {
    format!(
        "The secret '{namespace}/{name}' that is specified in the 'ingress.bluemix.net/ssl-services' annotation might be unusable for enforcing TLS to backend services. Edit the secret to ensure that the contents of '{source}' and '{target}' match."
    )
}

#[must_use]
pub fn tcp_port_not_allowed(port: &str, alb_id: &str, allowlist_key: &str) -> String {
    let alb = if alb_id.is_empty() { "any ALB" } else { alb_id };
    format!(
        "Annotation 'ingress.bluemix.net/tcp-ports': ingress port '{port}' for {alb} was not migrated because it is not listed in the '{allowlist_key}' parameter of the 'ibm-cloud-provider-ingress-cm' ConfigMap."
    )
}

/// Warnings of one resource, in first-seen order without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.0.contains(&warning) {
            self.0.push(warning);
        }
    }

    pub fn extend<I, S>(&mut self, warnings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for warning in warnings {
            self.push(warning);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, warning: &str) -> bool {
        self.0.iter().any(|w| w == warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_keep_first_occurrence_order() {
        let mut warnings = Warnings::new();
        warnings.push(REWRITES);
        warnings.push(HSTS);
        warnings.push(REWRITES.to_string());
        warnings.extend([CUSTOM_PORT, HSTS]);

        assert_eq!(warnings.into_vec(), vec![REWRITES, HSTS, CUSTOM_PORT]);
    }

    #[test]
    fn test_parameterised_texts() {
        assert_eq!(
            unsupported_cm_parameter("vts-status-zone"),
            "The 'vts-status-zone' parameter could not be migrated."
        );
        assert!(ssl_services_secret("default", "coffee-ssl", "trusted.crt", "ca.crt")
            .contains("'default/coffee-ssl'"));
        assert!(tcp_port_not_allowed("9090", "", "public-ports").contains("any ALB"));
    }
}
