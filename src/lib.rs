//! Console UI Operator Library
//!
//! Convergence engine, store abstraction and runtime for the Console UI Operator.
//!
//! ## Quick Start
//!
//! ```rust
//! use console_ui_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
