//! # Status Report
//!
//! Human-readable summary printed at the end of a run: where the output went,
//! a short FAQ, the run settings and every migrated resource with its
//! generated resources and warnings.

use std::io::{self, Write};
use std::path::Path;

use crate::migration::MigrationReport;

const FAQ: &[(&str, &str)] = &[
    (
        "Why do I have more resources than I had before?",
        "With the IBM Cloud Kubernetes Service Ingress controller, you could indicate specific services for the annotation to apply to. For example the following annotation configures the timeout only for the 'myservice' service, but has no effect on other services: ingress.bluemix.net/proxy-connect-timeout: \"serviceName=myservice timeout=5s\".
However, with the Kubernetes Ingress Controller, every annotation in an Ingress resource is applied to all service paths in that resource.
The migration tool creates one new Ingress resource for each service path that was specified in the original resource, so that you can modify the annotations for each service path. Also, a special Ingress resource with the '-server' suffix is generated that contains annotations that affect the NGINX configuration on the server level.",
    ),
    (
        "How do I proceed with migration warnings?",
        "The migration tool attempts to convert the old Ingress resource annotations and ConfigMap parameters into new ones that result in the same behavior. When the migration tool cannot convert an annotation or parameter automatically, or when the resulting behavior is slightly different, the tool generates a warning for the corresponding resource. The warning message contains the description of the problem and pointers to the IBM Cloud Kubernetes Service or NGINX documentation.",
    ),
];

fn list<W: Write>(out: &mut W, items: &[String], empty: &str) -> io::Result<()> {
    if items.is_empty() {
        return writeln!(out, "{empty}");
    }
    for item in items {
        writeln!(out, "- {item}")?;
    }
    Ok(())
}

/// Write the end-of-run status to `out`
///
/// # Errors
///
/// Write failures of `out`.
pub fn write_status<W: Write>(
    out: &mut W,
    output_dir: &Path,
    context: &str,
    report: &MigrationReport,
) -> io::Result<()> {
    writeln!(out, "Migration finished!")?;
    writeln!(
        out,
        "Find the migration logs and the migrated resources in YAML format under the {} directory.\n",
        output_dir.display()
    )?;

    writeln!(out, "Frequently Asked Questions\n")?;
    for (question, answer) in FAQ {
        writeln!(out, "Q: {question}")?;
        writeln!(out, "A: {answer}\n")?;
    }

    writeln!(out, "Migration Details\n")?;
    writeln!(out, "KubeConfig context:\t{context}")?;
    writeln!(out, "Migration mode:\t{}\n", report.mode)?;

    writeln!(out, "Migrated Resources\n")?;
    for entry in &report.entries {
        writeln!(out, "Resource name:\t{}", entry.name)?;
        writeln!(out, "Resource namespace:\t{}", entry.namespace)?;
        writeln!(out, "Resource kind:\t{}", entry.kind)?;
        writeln!(out, "Migrated to:")?;
        list(out, &entry.migrated_as, "No generated resources.")?;
        writeln!(out, "Resource migration warnings:")?;
        list(out, &entry.warnings, "No warnings.")?;
        writeln!(out)?;
    }

    if report.has_errors() {
        writeln!(out, "Errors\n")?;
        for error in &report.errors {
            writeln!(out, "- {error}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationMode;
    use crate::error::{AttributedError, ResourceError};
    use crate::migration::model::MigratedResource;

    #[test]
    fn test_status_lists_entries_and_errors() {
        let report = MigrationReport {
            entries: vec![MigratedResource {
                kind: "Ingress".to_string(),
                name: "cafe".to_string(),
                namespace: "default".to_string(),
                migrated_as: vec!["Ingress/cafe-server".to_string()],
                warnings: vec![],
            }],
            errors: vec![AttributedError::new(
                "Ingress",
                "default",
                "shop",
                ResourceError::EmptyRuleHost,
            )],
            mode: MigrationMode::TestWithPrivate,
        };
        let mut out = Vec::new();
        write_status(&mut out, Path::new("/tmp/out"), "prod-cluster", &report).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Migration finished!\n"));
        assert!(text.contains("under the /tmp/out directory"));
        assert!(text.contains("Migration mode:\ttest-with-private"));
        assert!(text.contains("- Ingress/cafe-server\n"));
        assert!(text.contains("Resource migration warnings:\nNo warnings.\n"));
        assert!(text.contains("- Ingress default/shop: host field of ingress rule is empty"));
    }
}
