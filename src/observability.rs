//! # Observability
//!
//! Tracing setup for the migration binary.
//!
//! The filter comes from `RUST_LOG`, defaulting to `ingress_migrator=info`.
//! With an output directory, log lines go to
//! `<dir>/migration-tool-<timestamp>.log` so the terminal only shows the final
//! status report.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::constants::DEFAULT_LOG_FILTER;

/// Name of the log file for a run started at `started`
#[must_use]
pub fn log_file_name(started: DateTime<Utc>) -> String {
    format!(
        "migration-tool-{}.log",
        started.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Install the global subscriber
///
/// `log_format` is `json` or anything else for text. Returns the log file
/// path when logs are written to `output_dir`.
///
/// # Errors
///
/// The output directory or log file cannot be created, or a subscriber is already installed.
pub fn init_tracing(log_format: &str, output_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (writer, log_file) = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
            let path = dir.join(log_file_name(Utc::now()));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), Some(path))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none());
    let installed = if log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;
    Ok(log_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_uses_rfc3339() {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            log_file_name(started),
            "migration-tool-2024-03-01T12:30:05Z.log"
        );
    }
}
