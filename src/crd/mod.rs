//! # Custom Resource Definitions
//!
//! CRD types for the Console UI Operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `ConsoleUI` specification and default values
//! - `status.rs` - Composite status types
//! - `external.rs` - Typed views of foreign CRDs (Route, Certificate, ConsoleLink, NavConfiguration)

mod external;
mod spec;
mod status;

// Re-export all public types
pub use external::{
    About, ApplicationMenu, Certificate, CertificateSpec, CertificateStatus, ConsoleLink,
    ConsoleLinkSpec, IssuerReference, NavConfiguration, NavConfigurationSpec, NavItem,
    ResourceCondition, Route, RouteIngress, RoutePort, RouteSpec, RouteStatus,
    RouteTargetReference, TlsConfig,
};
pub use spec::{
    default_true, AuthConfig, ConsoleConfig, ConsoleUI, ConsoleUISpec, GlobalConfig,
    ResourceSettings, ResourceValues, ScalingConfig,
};
pub use status::{Condition, ConsoleUIStatus, ManagedResourceStatus, Readiness, ServiceStatus};
