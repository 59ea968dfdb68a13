//! Ingress Migrator Library
//!
//! Migrates Ingress resources and controller ConfigMaps written for the legacy
//! `ingress.bluemix.net/*` annotation dialect to the community ingress-nginx
//! dialect, in one non-interactive pass against a live cluster.
//!
//! The binary in `main.rs` is a thin shell around [`migration::runner::Migrator`].

pub mod annotations;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod migration;
pub mod observability;
pub mod report;
