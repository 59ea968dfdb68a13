//! # Resource Dump Tests
//!
//! YAML dump of the objects recorded during a read-only run.

mod common;

use std::fs;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::Ingress;
use tempfile::TempDir;

use common::{cafe, config_map};
use ingress_migrator::client::{RecordedResource, ResourceRecorder};
use ingress_migrator::constants::KUBE_SYSTEM;

#[test]
fn test_dump_writes_one_file_per_object() {
    let dir = TempDir::new().unwrap();
    let mut recorder = ResourceRecorder::new();
    recorder.record("default", "cafe", RecordedResource::Ingress(cafe(&[])));
    recorder.record(
        KUBE_SYSTEM,
        "generic-k8s-ingress-tcp-ports",
        RecordedResource::ConfigMap(config_map(
            "generic-k8s-ingress-tcp-ports",
            &[("9090", "default/coffee-svc:8080")],
        )),
    );
    recorder.record(
        KUBE_SYSTEM,
        "ibm-ingress-migration-status",
        RecordedResource::ConfigMap(config_map("ibm-ingress-migration-status", &[])),
    );
    recorder.record_deletion("ConfigMap", KUBE_SYSTEM, "ibm-ingress-migration-status");

    let written = recorder.dump(dir.path()).unwrap();
    assert_eq!(written, 2);

    let ingress_file = dir.path().join("default").join("cafe.ingress.yaml");
    let ingress: Ingress = serde_yaml::from_str(&fs::read_to_string(ingress_file).unwrap()).unwrap();
    assert_eq!(ingress.metadata.name.as_deref(), Some("cafe"));

    let config_map_file = dir
        .path()
        .join(KUBE_SYSTEM)
        .join("generic-k8s-ingress-tcp-ports.configmap.yaml");
    let streams: ConfigMap =
        serde_yaml::from_str(&fs::read_to_string(config_map_file).unwrap()).unwrap();
    assert_eq!(streams.data.unwrap()["9090"], "default/coffee-svc:8080");

    assert!(!dir
        .path()
        .join(KUBE_SYSTEM)
        .join("ibm-ingress-migration-status.configmap.yaml")
        .exists());
}
