//! # Status Aggregator
//!
//! Polls every managed object after a pass that left the cluster unchanged and rolls
//! their readiness into the composite `ConsoleUIStatus`.
//!
//! - NotFound is `NotReady`; any other fetch failure is `Unknown`
//! - The aggregate is `Ready` iff every probed object is `Ready`
//! - The status is only written when the projection (timestamps aside) changed

mod readiness;

pub use readiness::{certificate_ready, deployment_ready, route_ready, service_ready};

use crate::constants::{
    APP_NAME, CALLBACK_ROUTE_NAME, CERTIFICATE_NAME, LOG4JS_CONFIGMAP_NAME, NAV_CONFIG_NAME,
    ROUTE_NAME,
};
use crate::controller::reconciler::environment::EnvironmentFacts;
use crate::crd::{
    Certificate, Condition, ConsoleUI, ConsoleUIStatus, ManagedResourceStatus, NavConfiguration,
    Readiness, Route, ServiceStatus,
};
use crate::observability::metrics;
use crate::store::{kind_of, ObjectStore, StoreError, StoreObject};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{Resource, ResourceExt};
use tracing::{debug, warn};

const READY_CONDITION: &str = "Ready";

async fn probe<S, K>(
    store: &S,
    namespace: &str,
    name: &str,
    ready: fn(&K) -> bool,
) -> ManagedResourceStatus
where
    S: ObjectStore,
    K: StoreObject,
{
    let status = match store.get::<K>(Some(namespace), name).await {
        Ok(object) if ready(&object) => Readiness::Ready,
        Ok(_) => Readiness::NotReady,
        Err(e) if e.is_not_found() => Readiness::NotReady,
        Err(e) => {
            warn!(kind = %kind_of::<K>(), name, error = %e, "Readiness probe failed");
            Readiness::Unknown
        }
    };
    ManagedResourceStatus {
        object_name: name.to_string(),
        namespace: namespace.to_string(),
        api_version: K::api_version(&()).into_owned(),
        kind: kind_of::<K>(),
        status,
    }
}

/// `Ready` iff every entry is `Ready`
#[must_use]
pub fn aggregate(resources: &[ManagedResourceStatus]) -> Readiness {
    if !resources.is_empty() && resources.iter().all(|r| r.status == Readiness::Ready) {
        Readiness::Ready
    } else {
        Readiness::NotReady
    }
}

fn service_status(instance: &ConsoleUI, resources: Vec<ManagedResourceStatus>) -> ServiceStatus {
    ServiceStatus {
        object_name: instance.name_any(),
        namespace: instance.namespace().unwrap_or_default(),
        api_version: ConsoleUI::api_version(&()).into_owned(),
        kind: ConsoleUI::kind(&()).into_owned(),
        status: aggregate(&resources),
        managed_resources: resources,
    }
}

/// Readiness of every object the instance manages
pub async fn compute_status<S: ObjectStore>(
    store: &S,
    instance: &ConsoleUI,
    facts: &EnvironmentFacts,
) -> ServiceStatus {
    let ns = instance.namespace().unwrap_or_default();
    let ns = ns.as_str();

    let mut resources = vec![
        probe::<_, ConfigMap>(store, ns, LOG4JS_CONFIGMAP_NAME, readiness::exists).await,
        probe::<_, ServiceAccount>(store, ns, APP_NAME, readiness::exists).await,
        probe::<_, Role>(store, ns, APP_NAME, readiness::exists).await,
        probe::<_, RoleBinding>(store, ns, APP_NAME, readiness::exists).await,
        probe::<_, Certificate>(store, ns, CERTIFICATE_NAME, certificate_ready).await,
        probe::<_, Service>(store, ns, APP_NAME, service_ready).await,
        probe::<_, Deployment>(store, ns, APP_NAME, deployment_ready).await,
    ];
    if instance.spec.scaling.enabled {
        resources.push(
            probe::<_, HorizontalPodAutoscaler>(store, ns, APP_NAME, readiness::exists).await,
        );
    }
    for name in [ROUTE_NAME, CALLBACK_ROUTE_NAME] {
        let entry = if facts.cncf {
            probe::<_, Ingress>(store, ns, name, readiness::exists).await
        } else {
            probe::<_, Route>(store, ns, name, route_ready).await
        };
        resources.push(entry);
    }
    resources.push(
        probe::<_, NavConfiguration>(store, ns, NAV_CONFIG_NAME, readiness::exists).await,
    );

    service_status(instance, resources)
}

fn ready_condition(status: Readiness, previous: Option<&ConsoleUIStatus>) -> Condition {
    let (value, reason, message) = match status {
        Readiness::Ready => ("True", "AllResourcesReady", "All managed resources are ready"),
        Readiness::NotReady | Readiness::Unknown => (
            "False",
            "ResourcesNotReady",
            "One or more managed resources are not ready",
        ),
    };
    // Keep the transition time while the condition holds
    let last_transition_time = previous
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == READY_CONDITION))
        .filter(|c| c.status == value)
        .and_then(|c| c.last_transition_time.clone())
        .or_else(|| Some(chrono::Utc::now().to_rfc3339()));

    Condition {
        r#type: READY_CONDITION.to_string(),
        status: value.to_string(),
        last_transition_time,
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

/// Full status for a computed service status
#[must_use]
pub fn build_status(instance: &ConsoleUI, service: ServiceStatus) -> ConsoleUIStatus {
    ConsoleUIStatus {
        conditions: vec![ready_condition(service.status, instance.status.as_ref())],
        service_status: Some(service),
        observed_generation: instance.metadata.generation,
    }
}

/// Status written before the first pass converges anything
#[must_use]
pub fn default_status(instance: &ConsoleUI) -> ConsoleUIStatus {
    build_status(instance, service_status(instance, Vec::new()))
}

fn without_timestamps(status: &ConsoleUIStatus) -> ConsoleUIStatus {
    let mut status = status.clone();
    for condition in &mut status.conditions {
        condition.last_transition_time = None;
    }
    status
}

/// Whether `next` differs from the instance's current status, timestamps aside
#[must_use]
pub fn status_changed(instance: &ConsoleUI, next: &ConsoleUIStatus) -> bool {
    instance
        .status
        .as_ref()
        .is_none_or(|current| without_timestamps(current) != without_timestamps(next))
}

/// Write `next` if it changed; returns whether a write happened
///
/// # Errors
///
/// Store failures from the status write.
pub async fn persist_status<S: ObjectStore>(
    store: &S,
    instance: &ConsoleUI,
    next: ConsoleUIStatus,
) -> Result<bool, StoreError> {
    if !status_changed(instance, &next) {
        debug!("Skipping status update - status unchanged");
        return Ok(false);
    }
    let mut updated = instance.clone();
    updated.status = Some(next);
    store.update_status(&updated).await?;
    metrics::record_store_write("ConsoleUI", "status");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ConsoleUISpec;
    use crate::store::{InjectedFailure, MemoryStore, Verb};

    fn entry(status: Readiness) -> ManagedResourceStatus {
        ManagedResourceStatus {
            object_name: "x".to_string(),
            namespace: "platform".to_string(),
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            status,
        }
    }

    fn instance() -> ConsoleUI {
        let mut instance = ConsoleUI::new("example-console", ConsoleUISpec::default());
        instance.metadata.namespace = Some("platform".to_string());
        instance
    }

    #[test]
    fn test_aggregate_requires_every_entry_ready() {
        use Readiness::{NotReady, Ready, Unknown};
        assert_eq!(aggregate(&[entry(Ready), entry(Ready), entry(NotReady)]), NotReady);
        assert_eq!(aggregate(&[entry(Ready), entry(Unknown)]), NotReady);
        assert_eq!(aggregate(&[entry(Ready), entry(Ready), entry(Ready)]), Ready);
        assert_eq!(aggregate(&[]), NotReady);
    }

    #[test]
    fn test_default_status_is_not_ready_and_empty() {
        let status = default_status(&instance());
        let service = status.service_status.unwrap();
        assert_eq!(service.status, Readiness::NotReady);
        assert!(service.managed_resources.is_empty());
        assert_eq!(service.kind, "ConsoleUI");
        assert_eq!(status.conditions[0].status, "False");
    }

    #[test]
    fn test_timestamps_alone_are_not_a_change() {
        let mut instance = instance();
        let status = default_status(&instance);
        instance.status = Some(status.clone());

        let mut later = status.clone();
        later.conditions[0].last_transition_time = Some("2030-01-01T00:00:00Z".to_string());
        assert!(!status_changed(&instance, &later));

        let mut different = status;
        if let Some(service) = different.service_status.as_mut() {
            service.managed_resources.push(entry(Readiness::Ready));
        }
        assert!(status_changed(&instance, &different));
    }

    #[test]
    fn test_transition_time_kept_while_condition_holds() {
        let mut instance = instance();
        let mut status = default_status(&instance);
        status.conditions[0].last_transition_time = Some("2020-01-01T00:00:00Z".to_string());
        instance.status = Some(status);

        let next = default_status(&instance);
        assert_eq!(
            next.conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_ready_and_errors_unknown() {
        let store = MemoryStore::new();
        let instance = instance();
        let facts = EnvironmentFacts::default();
        let service = compute_status(&store, &instance, &facts).await;
        assert_eq!(service.status, Readiness::NotReady);
        assert!(service
            .managed_resources
            .iter()
            .all(|r| r.status == Readiness::NotReady));
        let kinds: Vec<_> = service.managed_resources.iter().map(|r| r.kind.as_str()).collect();
        assert!(kinds.contains(&"Route"));
        assert!(!kinds.contains(&"HorizontalPodAutoscaler"));
    }

    #[tokio::test]
    async fn test_persist_only_when_changed() {
        let store = MemoryStore::new();
        let instance = store.insert(&instance()).unwrap();
        let status = default_status(&instance);
        assert!(persist_status(&store, &instance, status.clone()).await.unwrap());

        let stored: ConsoleUI = store.get(Some("platform"), "example-console").await.unwrap();
        store.clear_writes();
        assert!(!persist_status(&store, &stored, status).await.unwrap());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_status_write_failure_surfaces() {
        let store = MemoryStore::new();
        let instance = store.insert(&instance()).unwrap();
        store.inject_failure(
            Verb::UpdateStatus,
            "ConsoleUI",
            "example-console",
            InjectedFailure::Timeout,
        );
        let err = persist_status(&store, &instance, default_status(&instance))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
    }
}
