//! # Reconciler
//!
//! Convergence engine for `ConsoleUI` resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Load the instance; handle deletion through the finalizer
//! 2. Probe environment facts (admin hub, platform type, cluster address)
//! 3. Converge every managed kind in dependency order through the [`apply::Applier`]
//! 4. Remove deprecated objects left by earlier releases
//! 5. If nothing was created, aggregate readiness into the status

pub mod apply;
pub mod cleanup;
pub mod compare;
pub mod desired;
pub mod environment;
pub mod lifecycle;
pub mod preserve;
pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use reconcile::{reconcile, reconcile_instance};
pub use types::{
    BackoffState, KindOutcome, PassOutcome, PassSettings, Reconciler, ReconcilerError,
};
