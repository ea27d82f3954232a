//! Shared fixtures for the integration tests.
//!
//! Seeds a `MemoryStore` with the objects other platform components own and drives
//! passes until the operator stops asking for a follow-up.

#![allow(dead_code, reason = "each test binary uses a different subset of the fixtures")]

use console_ui_operator::constants::{
    CERTIFICATE_SECRET_NAME, CLUSTER_ADDRESS_KEY, CLUSTER_INFO_CONFIGMAP_NAME, CLUSTER_TYPE_KEY,
    PLATFORM_CONFIGMAP_NAME, PLATFORM_CONSOLE_ROUTE_NAME,
};
use console_ui_operator::prelude::*;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "platform";
pub const NAME: &str = "example-console";
pub const CLUSTER_ADDRESS: &str = "console.apps.example.com";
pub const CONSOLE_HOST: &str = "cp-console.apps.example.com";
pub const SERVING_CA: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

/// Upper bound on passes before a test gives up on convergence
const MAX_PASSES: usize = 10;

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..Default::default()
    }
}

pub fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: meta(name),
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn cluster_info(address: &str) -> ConfigMap {
    config_map(CLUSTER_INFO_CONFIGMAP_NAME, &[(CLUSTER_ADDRESS_KEY, address)])
}

pub fn serving_secret() -> Secret {
    Secret {
        metadata: meta(CERTIFICATE_SECRET_NAME),
        data: Some(BTreeMap::from([(
            "ca.crt".to_string(),
            ByteString(SERVING_CA.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn console_route() -> Route {
    let mut route = Route::new(
        PLATFORM_CONSOLE_ROUTE_NAME,
        RouteSpec {
            host: Some(CONSOLE_HOST.to_string()),
            path: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: "platform-console".to_string(),
                weight: None,
            },
            port: None,
            tls: None,
            wildcard_policy: None,
        },
    );
    route.metadata.namespace = Some(NAMESPACE.to_string());
    route
}

/// Store holding everything an OpenShift cluster provides before the operator runs
pub fn openshift_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(&cluster_info(CLUSTER_ADDRESS)).unwrap();
    store.insert(&serving_secret()).unwrap();
    store.insert(&console_route()).unwrap();
    store
}

/// Store for a CNCF cluster: no routes, no console links
pub fn cncf_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert(&config_map(PLATFORM_CONFIGMAP_NAME, &[(CLUSTER_TYPE_KEY, "cncf")]))
        .unwrap();
    store.insert(&cluster_info(CLUSTER_ADDRESS)).unwrap();
    store
}

pub fn instance(spec: ConsoleUISpec) -> ConsoleUI {
    let mut instance = ConsoleUI::new(NAME, spec);
    instance.metadata.namespace = Some(NAMESPACE.to_string());
    instance
}

pub fn seed(store: &MemoryStore, spec: ConsoleUISpec) -> ConsoleUI {
    store.insert(&instance(spec)).unwrap()
}

pub async fn pass(store: &MemoryStore) -> PassOutcome {
    reconcile_instance(store, NAMESPACE, NAME, &PassSettings::default())
        .await
        .unwrap()
}

/// Run passes until one no longer asks for a follow-up; returns the passes taken
pub async fn converge(store: &MemoryStore) -> usize {
    for passes in 1..=MAX_PASSES {
        if !pass(store).await.requeue {
            return passes;
        }
    }
    panic!("instance did not converge within {MAX_PASSES} passes");
}

pub async fn current(store: &MemoryStore) -> ConsoleUI {
    store.get(Some(NAMESPACE), NAME).await.unwrap()
}
