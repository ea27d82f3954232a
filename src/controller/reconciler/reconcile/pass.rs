//! One reconcile pass over a single `ConsoleUI` instance.
//!
//! Kinds run in dependency order. A kind whose input is missing is skipped and the
//! pass carries on; any other failure aborts the rest of the pass. When a kind created
//! something, the status is left alone until the follow-up pass.

use crate::constants::APP_NAME;
use crate::controller::reconciler::apply::Applier;
use crate::controller::reconciler::cleanup::remove_deprecated;
use crate::controller::reconciler::compare::Managed;
use crate::controller::reconciler::desired::{
    certificate, deployment, horizontal_pod_autoscaler, ingresses, log4js_config_map,
    nav_configuration, role, role_binding, routes, service, service_account, Inputs,
};
use crate::controller::reconciler::environment::{self, EnvironmentFacts};
use crate::controller::reconciler::lifecycle::{finalize, reconcile_console_link, FinalizerState};
use crate::controller::reconciler::status::{build_status, compute_status, default_status, persist_status};
use crate::controller::reconciler::types::{KindOutcome, PassOutcome, PassSettings, ReconcilerError};
use crate::crd::ConsoleUI;
use crate::observability::metrics;
use crate::store::ObjectStore;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::{Resource, ResourceExt};
use std::future::Future;
use tracing::{debug, info, info_span, Instrument};

async fn converge<S, K>(
    applier: &Applier<'_, S>,
    desired: Result<K, ReconcilerError>,
) -> Result<KindOutcome, ReconcilerError>
where
    S: ObjectStore,
    K: Managed,
{
    Ok(applier.apply(desired?).await?.outcome())
}

async fn converge_all<S, K>(
    applier: &Applier<'_, S>,
    desired: Result<Vec<K>, ReconcilerError>,
) -> Result<KindOutcome, ReconcilerError>
where
    S: ObjectStore,
    K: Managed,
{
    let mut outcome = KindOutcome::unchanged();
    for object in desired? {
        outcome |= applier.apply(object).await?.outcome();
    }
    Ok(outcome)
}

/// A missing dependency defers the kind; everything else passes through
fn settle(
    kind: &str,
    result: Result<KindOutcome, ReconcilerError>,
    deferred: &mut bool,
) -> Result<KindOutcome, ReconcilerError> {
    match result {
        Err(ReconcilerError::DependencyNotReady(what)) => {
            metrics::increment_dependency_not_ready(kind);
            info!(kind, waiting_for = %what, "⏳ Dependency not ready, skipping for this pass");
            *deferred = true;
            Ok(KindOutcome::unchanged())
        }
        other => other,
    }
}

/// Run one kind inside its own span
async fn run_kind<F>(
    kind: &'static str,
    step: F,
    deferred: &mut bool,
) -> Result<KindOutcome, ReconcilerError>
where
    F: Future<Output = Result<KindOutcome, ReconcilerError>>,
{
    let result = step.instrument(info_span!("kind", kind)).await;
    settle(kind, result, deferred)
}

async fn autoscaler<S: ObjectStore>(
    applier: &Applier<'_, S>,
    inputs: &Inputs<'_>,
) -> Result<KindOutcome, ReconcilerError> {
    if inputs.settings.scaling_enabled {
        return converge(applier, horizontal_pod_autoscaler(inputs)).await;
    }
    applier
        .remove::<HorizontalPodAutoscaler>(Some(inputs.namespace()), APP_NAME)
        .await?;
    Ok(KindOutcome::unchanged())
}

async fn exposure<S: ObjectStore>(
    applier: &Applier<'_, S>,
    inputs: &Inputs<'_>,
) -> Result<KindOutcome, ReconcilerError> {
    if inputs.facts.cncf {
        converge_all(applier, Ok(ingresses(inputs))).await
    } else {
        converge_all(applier, routes(inputs)).await
    }
}

/// Every per-kind reconciler, in dependency order
async fn converge_kinds<S: ObjectStore>(
    store: &S,
    inputs: &Inputs<'_>,
    settings: &PassSettings,
) -> Result<(KindOutcome, bool), ReconcilerError> {
    let applier = Applier::owned(store, inputs.instance)?;
    let mut total = KindOutcome::unchanged();
    let mut deferred = false;

    total |= run_kind(
        "ConfigMap",
        converge(&applier, Ok(log4js_config_map(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind(
        "ServiceAccount",
        converge(&applier, Ok(service_account(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind("Role", converge(&applier, Ok(role(inputs))), &mut deferred).await?;
    total |= run_kind(
        "RoleBinding",
        converge(&applier, Ok(role_binding(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind(
        "Certificate",
        converge(&applier, Ok(certificate(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind("Service", converge(&applier, Ok(service(inputs))), &mut deferred).await?;
    total |= run_kind(
        "Deployment",
        converge(&applier, Ok(deployment(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind(
        "HorizontalPodAutoscaler",
        autoscaler(&applier, inputs),
        &mut deferred,
    )
    .await?;
    total |= run_kind("Route", exposure(&applier, inputs), &mut deferred).await?;
    total |= run_kind(
        "NavConfiguration",
        converge(&applier, Ok(nav_configuration(inputs))),
        &mut deferred,
    )
    .await?;
    total |= run_kind(
        "ConsoleLink",
        reconcile_console_link(store, inputs, settings.finalizer_migration_window),
        &mut deferred,
    )
    .await?;

    Ok((total, deferred))
}

async fn converge_instance<S: ObjectStore>(
    store: &S,
    instance: &ConsoleUI,
    facts: &EnvironmentFacts,
    settings: &PassSettings,
) -> Result<PassOutcome, ReconcilerError> {
    let namespace = instance.namespace().unwrap_or_default();
    let inputs = Inputs::new(instance, facts, settings.utilization)?;
    let (outcome, deferred) = converge_kinds(store, &inputs, settings).await?;

    let removed = remove_deprecated(store, &namespace).await;
    if removed > 0 {
        debug!(removed, "Removed deprecated resources");
    }

    if outcome.changed {
        debug!("Objects created this pass, status deferred to the follow-up pass");
        return Ok(PassOutcome {
            requeue: true,
            deferred,
        });
    }

    let service_status = compute_status(store, instance, facts).await;
    let readiness = service_status.status;
    if persist_status(store, instance, build_status(instance, service_status)).await? {
        info!(status = %readiness, "Updated ConsoleUI status");
    }
    Ok(PassOutcome {
        requeue: false,
        deferred,
    })
}

/// Run one pass for the instance at `namespace/name`
///
/// # Errors
///
/// Store failures and invalid sizing values abort the pass. A missing dependency
/// only defers the affected kind. Optimistic-lock conflicts are reported as a
/// requeue rather than an error.
pub async fn reconcile_instance<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
    settings: &PassSettings,
) -> Result<PassOutcome, ReconcilerError> {
    let Some(instance) = store.get_opt::<ConsoleUI>(Some(namespace), name).await? else {
        debug!("ConsoleUI not found, owned objects are garbage-collected");
        return Ok(PassOutcome::done());
    };

    if instance.meta().deletion_timestamp.is_some() {
        if FinalizerState::of(&instance) == FinalizerState::Deleting {
            match finalize(store, instance).await {
                Err(e) if e.is_conflict() => {
                    info!(error = %e, "Instance changed while releasing finalizers, retrying");
                    return Ok(PassOutcome::requeue());
                }
                other => {
                    other?;
                }
            }
        }
        return Ok(PassOutcome::done());
    }

    if instance.status.is_none() {
        persist_status(store, &instance, default_status(&instance)).await?;
        info!("Initialized ConsoleUI status");
        return Ok(PassOutcome::requeue());
    }

    let facts = environment::probe(store, namespace).await?;
    debug!(
        platform = facts.platform(),
        admin_hub = facts.admin_hub_present,
        "Environment probed"
    );

    match converge_instance(store, &instance, &facts, settings).await {
        Err(e) if e.is_conflict() => {
            info!(error = %e, "Concurrent modification, retrying on the next pass");
            Ok(PassOutcome::requeue())
        }
        other => other,
    }
}
