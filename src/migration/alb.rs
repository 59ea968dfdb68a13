//! # ALB/TCP-Port Merger
//!
//! Folds the TCP ports requested by each resource into the run-scoped
//! [`AlbSpecificData`], refusing to let two resources route the same port of
//! the same ALB to different backends.

use tracing::{debug, error};

use super::model::{AlbSpecificData, TcpPortRequest};
use crate::error::RunError;

/// Split a `;`-separated `ALB-ID` value; an empty value yields no ids
#[must_use]
pub fn parse_alb_ids(alb_id_list: &str) -> Vec<String> {
    if alb_id_list.is_empty() {
        return Vec::new();
    }
    alb_id_list
        .split(';')
        .map(|alb| alb.trim().to_string())
        .collect()
}

/// ALB keys a request is filed under; `""` when no ALB was selected
#[must_use]
pub fn alb_keys(alb_id_list: &str) -> Vec<String> {
    let ids = parse_alb_ids(alb_id_list);
    if ids.is_empty() {
        vec![String::new()]
    } else {
        ids
    }
}

/// Merge `request` into `accumulator` for every ALB of `alb_id_list`
///
/// Ports already present with the same backend are left untouched. The
/// request is checked completely before anything is inserted, so a collision
/// leaves the accumulator as it was.
///
/// # Errors
///
/// [`RunError::TcpPortCollision`] when a port of one ALB is already routed elsewhere.
pub fn merge(
    accumulator: &mut AlbSpecificData,
    request: &TcpPortRequest,
    alb_id_list: &str,
) -> Result<(), RunError> {
    let albs = alb_keys(alb_id_list);

    for alb_id in &albs {
        let Some(existing) = accumulator.get(alb_id) else {
            continue;
        };
        for (port, wanted) in request {
            if existing.tcp_ports.get(port).is_some_and(|known| known != wanted) {
                error!(
                    "Collision in the tcp-ports annotations of different Ingresses for the same ALB (ALB: '{}', port: {})",
                    alb_id, port
                );
                return Err(RunError::TcpPortCollision {
                    alb_id: alb_id.clone(),
                    port: port.clone(),
                });
            }
        }
    }

    for alb_id in albs {
        let data = accumulator.entry(alb_id).or_default();
        for (port, wanted) in request {
            data.tcp_ports.entry(port.clone()).or_insert_with(|| {
                debug!("Routing TCP port {} to {}", port, wanted.stream_target());
                wanted.clone()
            });
        }
    }
    Ok(())
}
