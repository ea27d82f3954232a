//! # External-Resource Lifecycle
//!
//! The ConsoleLink is cluster-scoped, so it cannot carry an owner reference to the
//! namespaced instance. A finalizer on the instance guards it instead.
//!
//! ```text
//! no-finalizer ──(pass, not deleting)──> finalizer-present ──(deletion requested)──> deleting
//!                                                                                       │
//!                                    link deleted, every marker removed  <──────────────┘
//! ```
//!
//! Earlier releases used a different marker. While the migration window is open both
//! markers are added, and on deletion each marker present is handled on its own so
//! an instance carrying only the deprecated one is still released.

use crate::constants::{
    CONSOLE_LINK_FINALIZER, DEPRECATED_CONSOLE_LINK_FINALIZER, PLATFORM_CONSOLE_ROUTE_NAME,
};
use crate::controller::reconciler::apply::Applier;
use crate::controller::reconciler::desired::{console_link, console_link_name, Inputs};
use crate::controller::reconciler::types::{KindOutcome, ReconcilerError};
use crate::crd::{ConsoleLink, ConsoleUI, Route};
use crate::store::ObjectStore;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

/// Markers this operator recognizes, current first
pub const FINALIZERS: [&str; 2] = [CONSOLE_LINK_FINALIZER, DEPRECATED_CONSOLE_LINK_FINALIZER];

/// Finalizer state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    NoFinalizer,
    FinalizerPresent,
    Deleting,
}

impl FinalizerState {
    #[must_use]
    pub fn of(instance: &ConsoleUI) -> Self {
        let marked = has_marker(instance);
        match (instance.meta().deletion_timestamp.is_some(), marked) {
            (true, true) => FinalizerState::Deleting,
            (_, true) => FinalizerState::FinalizerPresent,
            (_, false) => FinalizerState::NoFinalizer,
        }
    }
}

fn has_marker(instance: &ConsoleUI) -> bool {
    instance
        .finalizers()
        .iter()
        .any(|f| FINALIZERS.contains(&f.as_str()))
}

/// Add the markers before the guarded ConsoleLink is created
///
/// Returns the instance as persisted. An instance already carrying a recognized
/// marker is returned unchanged.
///
/// # Errors
///
/// Store failures while persisting the instance.
pub async fn ensure_finalizers<S: ObjectStore>(
    store: &S,
    mut instance: ConsoleUI,
    migration_window: bool,
) -> Result<ConsoleUI, ReconcilerError> {
    if has_marker(&instance) {
        return Ok(instance);
    }

    let finalizers = instance.meta_mut().finalizers.get_or_insert_with(Vec::new);
    finalizers.push(CONSOLE_LINK_FINALIZER.to_string());
    if migration_window {
        finalizers.push(DEPRECATED_CONSOLE_LINK_FINALIZER.to_string());
    }
    let updated = store.update(&instance).await?;
    info!(migration_window, "🔒 Added ConsoleLink finalizer");
    Ok(updated)
}

/// Delete the guarded ConsoleLink and release every recognized marker
///
/// # Errors
///
/// Store failures other than the link already being gone.
pub async fn finalize<S: ObjectStore>(
    store: &S,
    mut instance: ConsoleUI,
) -> Result<KindOutcome, ReconcilerError> {
    let Some(namespace) = instance.namespace() else {
        return Err(ReconcilerError::invalid("ConsoleUI", "instance has no namespace"));
    };
    let link_name = console_link_name(&namespace);
    let applier = Applier::unowned(store);
    let mut released = Vec::new();

    for marker in FINALIZERS {
        if !instance.finalizers().iter().any(|f| f == marker) {
            continue;
        }
        if applier.remove::<ConsoleLink>(None, &link_name).await? {
            info!(link = %link_name, marker, "Deleted ConsoleLink guarded by finalizer");
        } else {
            debug!(link = %link_name, marker, "ConsoleLink already gone");
        }
        if let Some(finalizers) = instance.meta_mut().finalizers.as_mut() {
            finalizers.retain(|f| f != marker);
        }
        released.push(marker);
    }

    if released.is_empty() {
        return Ok(KindOutcome::unchanged());
    }
    store.update(&instance).await?;
    info!(released = ?released, "🔓 Released finalizers");
    Ok(KindOutcome::changed())
}

/// External host of the platform console route
async fn console_host<S: ObjectStore>(store: &S, namespace: &str) -> Result<String, ReconcilerError> {
    let route = store
        .get_opt::<Route>(Some(namespace), PLATFORM_CONSOLE_ROUTE_NAME)
        .await?
        .ok_or_else(|| {
            ReconcilerError::DependencyNotReady(format!(
                "route {namespace}/{PLATFORM_CONSOLE_ROUTE_NAME}"
            ))
        })?;
    route
        .spec
        .host
        .clone()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            route
                .status
                .as_ref()
                .and_then(|s| s.ingress.iter().find_map(|i| i.host.clone()))
        })
        .ok_or_else(|| {
            ReconcilerError::DependencyNotReady(format!(
                "host of route {namespace}/{PLATFORM_CONSOLE_ROUTE_NAME}"
            ))
        })
}

/// Converge the ConsoleLink, adding the finalizer first
///
/// CNCF clusters have no console links; no marker is added there.
///
/// # Errors
///
/// `DependencyNotReady` when the platform console route or its host is missing;
/// the marker stays in place and the next pass retries. Store failures otherwise.
pub async fn reconcile_console_link<S: ObjectStore>(
    store: &S,
    inputs: &Inputs<'_>,
    migration_window: bool,
) -> Result<KindOutcome, ReconcilerError> {
    if inputs.facts.cncf {
        debug!("CNCF cluster, no ConsoleLink");
        return Ok(KindOutcome::unchanged());
    }

    ensure_finalizers(store, inputs.instance.clone(), migration_window).await?;

    let host = match console_host(store, inputs.namespace()).await {
        Ok(host) => host,
        Err(e) => {
            warn!(error = %e, "Cannot derive ConsoleLink address");
            return Err(e);
        }
    };
    let applied = Applier::unowned(store)
        .apply(console_link(inputs, &host))
        .await?;
    Ok(applied.outcome())
}
