//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::DEFAULT_ERROR_BACKOFF_MIN_SECS;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::desired::UtilizationPolicy;
use crate::store::{KubeStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// A value this kind needs (route host, serving CA) is not available yet
    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid {kind}: {reason}")]
    InvalidObject { kind: String, reason: String },

    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

impl ReconcilerError {
    #[must_use]
    pub fn is_dependency_not_ready(&self) -> bool {
        matches!(self, ReconcilerError::DependencyNotReady(_))
    }

    /// Optimistic-lock collision; the next pass re-reads and retries
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::Store(e) if e.is_conflict())
    }

    pub(crate) fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        ReconcilerError::InvalidObject {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

/// What one per-kind reconciler did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindOutcome {
    /// The cluster changed in a way the next pass must observe
    pub changed: bool,
}

impl KindOutcome {
    #[must_use]
    pub const fn changed() -> Self {
        Self { changed: true }
    }

    #[must_use]
    pub const fn unchanged() -> Self {
        Self { changed: false }
    }
}

impl std::ops::BitOr for KindOutcome {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            changed: self.changed || rhs.changed,
        }
    }
}

impl std::ops::BitOrAssign for KindOutcome {
    fn bitor_assign(&mut self, rhs: Self) {
        self.changed |= rhs.changed;
    }
}

/// Result of one orchestrator pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Run another pass soon
    pub requeue: bool,
    /// A kind was skipped because something it derives from is missing
    pub deferred: bool,
}

impl PassOutcome {
    #[must_use]
    pub const fn done() -> Self {
        Self {
            requeue: false,
            deferred: false,
        }
    }

    #[must_use]
    pub const fn requeue() -> Self {
        Self {
            requeue: true,
            deferred: false,
        }
    }
}

/// Knobs the orchestrator reads on every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSettings {
    /// Add the deprecated finalizer alongside the current one
    pub finalizer_migration_window: bool,
    /// Autoscaling target utilization policy
    pub utilization: UtilizationPolicy,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            finalizer_migration_window: true,
            utilization: UtilizationPolicy::default(),
        }
    }
}

impl PassSettings {
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            finalizer_migration_window: config.finalizer_migration_window,
            utilization: UtilizationPolicy::default(),
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(DEFAULT_ERROR_BACKOFF_MIN_SECS, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared controller context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: KubeStore,
    pub config: Arc<ControllerConfig>,
    pub settings: PassSettings,
    // Backoff state per resource (identified by namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(store: KubeStore, config: ControllerConfig) -> Self {
        Self {
            store,
            settings: PassSettings::from_config(&config),
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delay before the follow-up pass after a pass that changed the cluster
    #[must_use]
    pub fn requeue_after_change(&self) -> Duration {
        Duration::from_secs(self.config.requeue_after_change_secs)
    }

    /// Forget the error streak of a resource after a clean pass
    pub fn reset_backoff(&self, namespace: &str, name: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(&format!("{namespace}/{name}")) {
                state.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_fold_with_or() {
        let mut total = KindOutcome::unchanged();
        total |= KindOutcome::unchanged();
        assert!(!total.changed);
        total |= KindOutcome::changed();
        total |= KindOutcome::unchanged();
        assert!(total.changed);
        assert_eq!(KindOutcome::unchanged() | KindOutcome::changed(), KindOutcome::changed());
    }

    #[test]
    fn test_conflict_classification() {
        let conflict = ReconcilerError::Store(StoreError::Conflict {
            kind: "Deployment".into(),
            key: "ns/console-ui".into(),
        });
        assert!(conflict.is_conflict());
        assert!(!conflict.is_dependency_not_ready());

        let pending = ReconcilerError::DependencyNotReady("route host".into());
        assert!(pending.is_dependency_not_ready());
        assert!(!pending.is_conflict());
    }

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(60);
        state.increment_error();
        state.increment_error();
        assert_eq!(state.error_count, 2);
        state.reset();
        assert_eq!(state.error_count, 0);
    }
}
