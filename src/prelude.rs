//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use console_ui_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_instance, KindOutcome, PassOutcome, PassSettings, Reconciler,
    ReconcilerError,
};

// Store abstraction
pub use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError, StoreObject};

// Configuration
pub use crate::config::ControllerConfig;
