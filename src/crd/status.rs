//! # ConsoleUI Status
//!
//! Composite status types. The status is recomputed from the managed objects on
//! every pass that did not change the cluster.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the ConsoleUI resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleUIStatus {
    /// Aggregate readiness plus per-object readiness of everything the operator manages
    #[serde(default)]
    pub service_status: Option<ServiceStatus>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec the status was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

/// Readiness of the console service as a whole
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub object_name: String,
    pub namespace: String,
    pub api_version: String,
    pub kind: String,
    /// Ready iff every managed resource is Ready
    pub status: Readiness,
    #[serde(default)]
    pub managed_resources: Vec<ManagedResourceStatus>,
}

/// Readiness of a single managed object
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    pub object_name: String,
    pub namespace: String,
    pub api_version: String,
    pub kind: String,
    pub status: Readiness,
}

/// Tri-state readiness reported for each managed object
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    #[default]
    NotReady,
    Unknown,
}

impl Readiness {
    /// Get string representation as written to the status
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Ready => "Ready",
            Readiness::NotReady => "NotReady",
            Readiness::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
