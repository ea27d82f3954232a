//! # Error Policy
//!
//! Backoff for failed passes and classification of watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::ConsoleUI;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Metric label for a failed pass
#[must_use]
pub fn error_class(error: &ReconcilerError) -> &'static str {
    match error {
        ReconcilerError::DependencyNotReady(_) => "dependency",
        ReconcilerError::Store(e) if e.is_conflict() => "conflict",
        ReconcilerError::Store(crate::store::StoreError::Timeout { .. }) => "timeout",
        ReconcilerError::Store(_) => "store",
        ReconcilerError::InvalidObject { .. } => "invalid",
        ReconcilerError::ReconciliationFailed(_) => "other",
    }
}

/// Requeue a failed instance with its own Fibonacci backoff
pub fn handle_reconciliation_error(
    instance: Arc<ConsoleUI>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = instance.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = instance.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    metrics::increment_reconciliation_errors(error_class(error));

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key)
                .or_insert_with(|| BackoffState::new(ctx.config.error_backoff_max_secs));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff states: {}, using default backoff", e);
            (ctx.config.reconciliation_error_requeue_secs, 0)
        }
    };

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
        backoff_seconds, error_count
    );
    metrics::increment_requeues();
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// How a watch stream error is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version expired, normal after restarts
    Expired,
    /// API server throttling or reinitializing storage
    Throttled,
    /// Watched kind or object missing (for example an optional CRD)
    NotFound,
    Other,
}

/// Classify a controller stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a decode error mentioning WatchFailed
    let not_found = error.contains("ObjectNotFound")
        || error.contains("404")
        || error.contains("not found");
    if (error.contains("401") || error.contains("Unauthorized")) && !not_found {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else if not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Handle a watch stream error
///
/// Returns `None` to drop the event, `Some(())` to pass it on.
pub async fn handle_watch_stream_error(
    error: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::warn_span!("controller.watch.error", error = %error);
    let _error_guard = error_span.enter();

    match classify_watch_error(error) {
        WatchErrorKind::Unauthorized => {
            error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("   Verify the operator ServiceAccount, ClusterRole and ClusterRoleBinding still exist");
            warn!(
                "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay.as_secs()
            );
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
            None
        }
        WatchErrorKind::Throttled => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!(
                "API server throttling (429), backing off for {}ms before restart...",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Watched object or kind not found (404) - normal for deleted objects or optional CRDs. Error: {}",
                error
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error);
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_watch_error_classification() {
        assert_eq!(
            classify_watch_error("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("WatchFailed: too old resource version"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::Throttled
        );
        assert_eq!(
            classify_watch_error("WatchFailed(Api(ErrorResponse { code: 404, reason: \"NotFound\" }))"),
            WatchErrorKind::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorKind::Other);
    }

    #[test]
    fn test_error_classes() {
        let conflict = ReconcilerError::Store(StoreError::Conflict {
            kind: "Deployment".into(),
            key: "platform/console-ui".into(),
        });
        assert_eq!(error_class(&conflict), "conflict");
        assert_eq!(
            error_class(&ReconcilerError::invalid("ConsoleUI", "bad cpu")),
            "invalid"
        );
        let timeout = ReconcilerError::Store(StoreError::Timeout {
            operation: "get",
            kind: "Route".into(),
            key: "platform/console-ui".into(),
            timeout: Duration::from_secs(30),
        });
        assert_eq!(error_class(&timeout), "timeout");
    }

    #[tokio::test]
    async fn test_throttling_doubles_backoff_up_to_max() {
        let backoff = Arc::new(AtomicU64::new(1));
        let result =
            handle_watch_stream_error("429 TooManyRequests", &backoff, 3, Duration::ZERO).await;
        assert!(result.is_none());
        assert_eq!(backoff.load(Ordering::Relaxed), 2);
        handle_watch_stream_error("429", &backoff, 3, Duration::ZERO).await;
        assert_eq!(backoff.load(Ordering::Relaxed), 3);
    }
}
