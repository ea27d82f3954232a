//! # Configuration
//!
//! Operator settings read once at startup from the process environment.

mod controller;

pub use controller::ControllerConfig;
