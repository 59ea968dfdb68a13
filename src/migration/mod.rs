//! # Migration
//!
//! Conversion of legacy Ingress resources and controller settings into the
//! community dialect.
//!
//! - [`resolver`]: legacy Ingress to [`model::IngressConfig`]
//! - [`splitter`]: one unit per location plus a server unit, named by [`naming`]
//! - [`render`]: unit to community Ingress
//! - [`alb`] and [`tcp_ports`]: TCP streams per ALB
//! - [`configmap`]: controller-wide options
//! - [`ledger`]: cross-run status record
//! - [`runner`]: the batch over all resources

pub mod alb;
pub mod appid;
pub mod configmap;
pub mod ledger;
pub mod model;
pub mod naming;
pub mod render;
pub mod resolver;
pub mod runner;
pub mod secrets;
pub mod splitter;
pub mod subdomain;
pub mod tcp_ports;
pub mod warnings;

pub use runner::{MigrationReport, Migrator};
