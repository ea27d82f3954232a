//! # Reconciliation Logic
//!
//! Entry point the controller runtime calls for every `ConsoleUI` event. The pass
//! itself lives in [`pass`]; this layer adds the span, metrics and the requeue
//! decision. Failed passes are retried by `error_policy` with a per-instance backoff.

mod pass;

pub use pass::reconcile_instance;

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::ConsoleUI;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Reconcile one `ConsoleUI` instance
///
/// # Errors
///
/// Returns the pass error; the controller hands it to the error policy.
pub async fn reconcile(
    instance: Arc<ConsoleUI>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = instance.metadata.name.clone().unwrap_or_default();
    let namespace = instance.metadata.namespace.clone().unwrap_or_default();
    metrics::increment_reconciliations();

    let span = tracing::info_span!(
        "reconcile",
        resource.kind = "ConsoleUI",
        resource.namespace = namespace.as_str(),
        resource.name = name.as_str(),
        resource.generation = instance.metadata.generation.unwrap_or(0)
    );

    let result = reconcile_instance(&ctx.store, &namespace, &name, &ctx.settings)
        .instrument(span.clone())
        .await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    ctx.reset_backoff(&namespace, &name);

    let _guard = span.enter();
    if outcome.requeue {
        metrics::increment_requeues();
        let after = ctx.requeue_after_change();
        info!(after_secs = after.as_secs(), "🔄 Cluster changed, requeueing");
        return Ok(Action::requeue(after));
    }
    if outcome.deferred {
        metrics::increment_requeues();
        let after = ctx.config.reconciliation_error_requeue_duration();
        info!(after_secs = after.as_secs(), "Waiting for dependencies, requeueing");
        return Ok(Action::requeue(after));
    }
    debug!(elapsed_ms = start.elapsed().as_millis(), "✅ Reconciled");
    Ok(Action::await_change())
}
