//! # Watch Loop
//!
//! Runs the `kube-runtime` controller for `ConsoleUI`.
//!
//! Triggers a pass when an instance changes, when any object it owns changes, and when
//! one of the unowned probe objects (environment ConfigMaps, the platform console
//! route) changes in an instance's namespace. Restarts the controller stream after
//! it ends until shutdown is requested.

use crate::config::ControllerConfig;
use crate::constants::{
    ADMIN_HUB_CONFIGMAP_NAME, CLUSTER_INFO_CONFIGMAP_NAME, PLATFORM_CONFIGMAP_NAME,
    PLATFORM_CONSOLE_ROUTE_NAME,
};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Certificate, ConsoleUI, NavConfiguration, Route};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::Api;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Client, ResourceExt};
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Optional kinds whose CRDs are installed in the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstalledKinds {
    pub routes: bool,
    pub certificates: bool,
    pub nav_configurations: bool,
}

/// ConfigMaps read as environment facts
const PROBE_CONFIGMAPS: [&str; 3] = [
    ADMIN_HUB_CONFIGMAP_NAME,
    PLATFORM_CONFIGMAP_NAME,
    CLUSTER_INFO_CONFIGMAP_NAME,
];

/// Whether a change to this ConfigMap can change an instance's environment facts
#[must_use]
pub fn is_probe_config_map(name: &str) -> bool {
    PROBE_CONFIGMAPS.contains(&name)
}

/// Every cached instance in `namespace`
fn instances_in(instances: &Store<ConsoleUI>, namespace: Option<String>) -> Vec<ObjectRef<ConsoleUI>> {
    instances
        .state()
        .into_iter()
        .filter(|instance| instance.namespace() == namespace)
        .map(|instance| ObjectRef::from_obj(instance.as_ref()))
        .collect()
}

fn build_controller(
    client: &Client,
    config: &ControllerConfig,
    installed: InstalledKinds,
) -> Controller<ConsoleUI> {
    let owned = watcher::Config::default();
    let mut controller = Controller::new(
        Api::<ConsoleUI>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
    .owns(Api::<ConfigMap>::all(client.clone()), owned.clone())
    .owns(Api::<ServiceAccount>::all(client.clone()), owned.clone())
    .owns(Api::<Role>::all(client.clone()), owned.clone())
    .owns(Api::<RoleBinding>::all(client.clone()), owned.clone())
    .owns(Api::<Service>::all(client.clone()), owned.clone())
    .owns(Api::<Deployment>::all(client.clone()), owned.clone())
    .owns(Api::<HorizontalPodAutoscaler>::all(client.clone()), owned.clone())
    .owns(Api::<Ingress>::all(client.clone()), owned.clone());

    if installed.certificates {
        controller = controller.owns(Api::<Certificate>::all(client.clone()), owned.clone());
    }
    if installed.nav_configurations {
        controller = controller.owns(Api::<NavConfiguration>::all(client.clone()), owned.clone());
    }

    let instances = controller.store();
    controller = controller.watches(
        Api::<ConfigMap>::all(client.clone()),
        watcher::Config::default(),
        move |config_map| {
            if is_probe_config_map(&config_map.name_any()) {
                instances_in(&instances, config_map.namespace())
            } else {
                Vec::new()
            }
        },
    );

    if installed.routes {
        controller = controller.owns(Api::<Route>::all(client.clone()), owned);
        let instances = controller.store();
        controller = controller.watches(
            Api::<Route>::all(client.clone()),
            watcher::Config::default(),
            move |route| {
                if route.name_any() == PLATFORM_CONSOLE_ROUTE_NAME {
                    instances_in(&instances, route.namespace())
                } else {
                    Vec::new()
                }
            },
        );
    }

    controller
}

/// Run the controller until shutdown is requested
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    installed: InstalledKinds,
) {
    let config = Arc::clone(&reconciler.config);
    let backoff_ms = Arc::new(AtomicU64::new(config.backoff_start_ms));

    // Mark not ready on SIGINT/SIGTERM so the loop stops restarting the stream
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_state.set_ready(false);
        }
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting controller watch loop...");
        let backoff = Arc::clone(&backoff_ms);
        let stream_config = Arc::clone(&config);
        build_controller(&client, &config, installed)
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                let config = Arc::clone(&stream_config);
                async move {
                    match &event {
                        Ok((object, _action)) => {
                            backoff.store(
                                config.backoff_start_ms,
                                std::sync::atomic::Ordering::Relaxed,
                            );
                            debug!(object = %object, "watch.event.reconciled");
                            Some(event)
                        }
                        Err(e) => {
                            let error = format!("{e:?}");
                            handle_watch_stream_error(
                                &error,
                                &backoff,
                                config.backoff_max_ms,
                                config.watch_restart_delay_duration(),
                            )
                            .await
                            .map(|()| event)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        let delay = config.watch_restart_delay_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_config_maps() {
        assert!(is_probe_config_map(PLATFORM_CONFIGMAP_NAME));
        assert!(is_probe_config_map(CLUSTER_INFO_CONFIGMAP_NAME));
        assert!(is_probe_config_map(ADMIN_HUB_CONFIGMAP_NAME));
        assert!(!is_probe_config_map("console-ui-log4js"));
    }
}
