//! # Ingress Migrator
//!
//! Migrates the legacy IKS Ingress resources and controller ConfigMap of the
//! current cluster to the community ingress-nginx dialect.
//!
//! ```bash
//! KUBECONFIG=~/.kube/config MIGRATION_MODE=test TEST_DOMAIN=test.example.net \
//!   TEST_SECRET=test-tls ingress-migrator --outputdir ./migration
//! ```
//!
//! Settings come from the environment (`MIGRATION_MODE`, `TEST_DOMAIN`,
//! `TEST_SECRET`, `READ_ONLY`, `DUMP_RESOURCES`, `LOG_FORMAT`); command-line
//! flags override them.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kube::config::Kubeconfig;
use kube::Client;
use tracing::{error, info, warn};

use ingress_migrator::client::KubeClusterClient;
use ingress_migrator::config::{MigrationMode, RunConfig};
use ingress_migrator::migration::Migrator;
use ingress_migrator::{observability, report};

#[derive(Parser, Debug)]
#[command(name = "ingress-migrator")]
#[command(
    about = "Migrate IKS ingress resources to the community ingress-nginx dialect",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")")
)]
struct Cli {
    /// Directory receiving the log file and the generated resources
    #[arg(long = "outputdir", value_name = "DIR")]
    output_dir: PathBuf,

    /// Migration mode, overrides MIGRATION_MODE
    #[arg(long)]
    mode: Option<MigrationMode>,

    /// Only record writes instead of sending them, overrides READ_ONLY
    #[arg(long, value_name = "BOOL")]
    read_only: Option<bool>,

    /// Dump recorded writes as YAML, overrides DUMP_RESOURCES
    #[arg(long, value_name = "BOOL")]
    dump_resources: Option<bool>,
}

fn run_config(cli: Cli) -> Result<RunConfig> {
    let mut config = RunConfig::from_env().context("Invalid environment configuration")?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(read_only) = cli.read_only {
        config.read_only = read_only;
    }
    if let Some(dump_resources) = cli.dump_resources {
        config.dump_resources = dump_resources;
    }
    config.output_dir = Some(cli.output_dir);
    config.validate()?;
    Ok(config)
}

fn kube_context() -> String {
    Kubeconfig::read()
        .ok()
        .and_then(|kubeconfig| kubeconfig.current_context)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|provider| {
            anyhow::anyhow!("Failed to install rustls crypto provider, already set: {provider:?}")
        })?;

    let mut config = run_config(Cli::parse())?;
    let output_dir = config.output_dir.clone().unwrap_or_default();
    observability::init_tracing(&config.log_format, Some(&output_dir))?;
    info!(
        "Starting ingress migrator {} (built {}, mode: {}, read-only: {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATETIME"),
        config.mode,
        config.read_only
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;
    let cluster = KubeClusterClient::new(client, config.read_only);
    config.enhancements_enabled = match cluster.detect_ingress_enhancements().await {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!("Could not read the API server version, assuming pathType support: {}", e);
            true
        }
    };

    let outcome = Migrator::new(&cluster, &config).run().await;

    if config.dump_resources {
        let dumped = cluster
            .dump(&output_dir)
            .context("Failed to dump migrated resources")?;
        info!("Dumped {} resources to {}", dumped, output_dir.display());
    }

    let migration = match outcome {
        Ok(migration) => migration,
        Err(e) => {
            error!("Migration failed: {}", e);
            eprintln!("\n\nA problem occurred while running the migration: {e}\n");
            return Err(e.into());
        }
    };

    if config.dump_resources {
        report::write_status(&mut io::stdout().lock(), &output_dir, &kube_context(), &migration)
            .context("Failed to print migration status")?;
    }
    if migration.has_errors() {
        anyhow::bail!(
            "{} resources could not be migrated completely, see the log file in {}",
            migration.errors.len(),
            output_dir.display()
        );
    }
    Ok(())
}
