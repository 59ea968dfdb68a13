//! # Test Mode Tests
//!
//! Runs in `test` and `test-with-private` mode: generated hostnames, the test
//! secret, the test ingress class and the separate controller ConfigMap.

mod common;

use common::{
    annotation, cafe, cluster_with_controllers, ingress, rule_hosts, test_mode, FixedRandom,
    TEST_SECRET,
};
use ingress_migrator::annotations;
use ingress_migrator::config::MigrationMode;
use ingress_migrator::constants::{
    INGRESS_CLASS_ANNOTATION, K8S_CONFIG_MAP_NAME, KUBE_SYSTEM, TEST_INGRESS_CLASS,
    TEST_K8S_CONFIG_MAP_NAME,
};
use ingress_migrator::migration::ledger::StatusLedger;
use ingress_migrator::migration::Migrator;

fn shop() -> k8s_openapi::api::networking::v1::Ingress {
    ingress(
        "default",
        "shop",
        &[],
        &[
            ("cafe.example.com", &[("/shop", "shop-svc")]),
            ("*.shop.example.com", &[("/", "shop-svc")]),
        ],
        &[(&["cafe.example.com"], "cafe-tls")],
    )
}

#[tokio::test]
async fn test_hosts_and_secrets_are_replaced() {
    let cluster = cluster_with_controllers(&[("keep-alive", "1m")])
        .with_ingress(cafe(&[]))
        .with_ingress(shop());
    let config = test_mode(MigrationMode::Test);

    let report = Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("a1b2c3d4e5")))
        .run()
        .await
        .unwrap();
    assert!(!report.has_errors());

    let server = cluster.ingress("default", "cafe-server").unwrap();
    assert_eq!(annotation(&server, INGRESS_CLASS_ANNOTATION), Some(TEST_INGRESS_CLASS));
    assert_eq!(rule_hosts(&server), vec!["a1b2c3d4.test.example.net"]);
    let tls = server.spec.unwrap().tls.unwrap();
    assert_eq!(tls.len(), 1);
    assert_eq!(tls[0].secret_name.as_deref(), Some(TEST_SECRET));

    // The host shared with cafe keeps the test hostname assigned to cafe
    let shop_server = cluster.ingress("default", "shop-server").unwrap();
    assert_eq!(
        rule_hosts(&shop_server),
        vec!["a1b2c3d4.test.example.net", "*.wc-0.test.example.net"]
    );

    let state = StatusLedger::new(&cluster).read().await.unwrap();
    assert_eq!(state.mode, Some(MigrationMode::Test));
    assert_eq!(state.subdomains.len(), 2);
    assert_eq!(state.subdomains["cafe.example.com"], "a1b2c3d4.test.example.net");
    assert_eq!(state.subdomains["*.shop.example.com"], "*.wc-0.test.example.net");
}

#[tokio::test]
async fn test_controller_settings_go_to_test_config_map() {
    let cluster = cluster_with_controllers(&[("keep-alive", "1m")]).with_ingress(cafe(&[]));
    let config = test_mode(MigrationMode::TestWithPrivate);

    let report = Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("zzzzzzzz")))
        .run()
        .await
        .unwrap();

    let test_config = cluster.config_map(KUBE_SYSTEM, TEST_K8S_CONFIG_MAP_NAME).unwrap();
    let test_data = test_config.data.unwrap();
    assert_eq!(test_data["keep-alive"], "60");
    assert_eq!(test_data["ssl-redirect"], "true");

    let live = cluster.config_map(KUBE_SYSTEM, K8S_CONFIG_MAP_NAME).unwrap();
    assert!(!live.data.unwrap().contains_key("keep-alive"));

    assert_eq!(
        report.entries[0].migrated_as,
        vec![format!("ConfigMap/{TEST_K8S_CONFIG_MAP_NAME}")]
    );
}

#[tokio::test]
async fn test_private_albs_are_skipped_only_in_test_mode() {
    let private = || {
        ingress(
            "default",
            "internal",
            &[(annotations::ALB_ID, "private-cr1-alb1")],
            &[("internal.example.com", &[("/", "internal-svc")])],
            &[],
        )
    };

    let cluster = cluster_with_controllers(&[]).with_ingress(private());
    let config = test_mode(MigrationMode::Test);
    let report = Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("q1w2e3r4")))
        .run()
        .await
        .unwrap();
    assert!(report.entries.iter().all(|e| e.name != "internal"));
    assert!(cluster.ingress("default", "internal-server").is_none());

    let cluster = cluster_with_controllers(&[]).with_ingress(private());
    let config = test_mode(MigrationMode::TestWithPrivate);
    Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("q1w2e3r4")))
        .run()
        .await
        .unwrap();
    let server = cluster.ingress("default", "internal-server").unwrap();
    assert_eq!(annotation(&server, INGRESS_CLASS_ANNOTATION), Some(TEST_INGRESS_CLASS));
    assert_eq!(rule_hosts(&server), vec!["q1w2e3r4.test.example.net"]);
}

#[tokio::test]
async fn test_generated_resources_are_skipped_on_rerun() {
    let cluster = cluster_with_controllers(&[]).with_ingress(cafe(&[]));
    let config = test_mode(MigrationMode::Test);

    Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("aaaaaaaa")))
        .run()
        .await
        .unwrap();
    let after_first = cluster.ingress_names();

    let report = Migrator::new(&cluster, &config)
        .with_random(Box::new(FixedRandom("bbbbbbbb")))
        .run()
        .await
        .unwrap();

    assert_eq!(cluster.ingress_names(), after_first);
    let migrated: Vec<&str> = report.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(migrated, vec!["ibm-cloud-provider-ingress-cm", "cafe"]);
    let server = cluster.ingress("default", "cafe-server").unwrap();
    assert_eq!(rule_hosts(&server), vec!["bbbbbbbb.test.example.net"]);
}
