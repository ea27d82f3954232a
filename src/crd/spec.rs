//! # ConsoleUI Spec
//!
//! Main CRD specification types and default values.
//!
//! Every field is optional on the wire. Absence always means "use the documented
//! default", never "disable the feature".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ConsoleUI Custom Resource Definition
///
/// Describes one deployment of the platform console UI. The operator converges the
/// workload, its network exposure, certificates, access control and navigation
/// objects toward the state derived from this resource.
///
/// # Example
///
/// ```yaml
/// apiVersion: console-ui.octopilot.io/v1alpha1
/// kind: ConsoleUI
/// metadata:
///   name: example-console
///   namespace: platform
/// spec:
///   consoleConfig:
///     imageTag: 4.2.1
///     ingressPath: /common-nav
///   globalConfig:
///     cloudPakVersion: "4.0"
///   replicas: 2
///   scaling:
///     enabled: true
///     maxReplicas: 4
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "ConsoleUI",
    group = "console-ui.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ConsoleUIStatus",
    shortname = "cui",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.serviceStatus.status"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleUISpec {
    /// Service, image and path configuration of the console workload
    #[serde(default)]
    pub console_config: ConsoleConfig,
    /// Platform-wide settings passed to the console (auth, session, versions)
    #[serde(default)]
    pub global_config: GlobalConfig,
    /// Desired replica count. Values below 1 are raised to 1 when the workload is
    /// first created; an existing workload scaled to 0 stays at 0.
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Horizontal scaling policy
    #[serde(default)]
    pub scaling: ScalingConfig,
    /// Resource sizing for the console container
    #[serde(default)]
    pub resources: Option<ResourceSettings>,
    /// Extra labels applied to every managed object and to the pod template
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Enable metrics scraping annotations and in-app metric collection
    #[serde(default)]
    pub enable_metrics_collection: bool,
}

/// Console service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    /// Service name advertised to the navigation (default: console-ui)
    #[serde(default)]
    pub service_name: Option<String>,
    /// Image registry (default: quay.io/octopilot)
    #[serde(default)]
    pub image_registry: Option<String>,
    /// Image repository name (default: console-ui)
    #[serde(default)]
    pub image_name: Option<String>,
    /// Image tag (default: the release this operator ships with)
    #[serde(default)]
    pub image_tag: Option<String>,
    /// Path the console is served under (default: /common-nav)
    #[serde(default)]
    pub ingress_path: Option<String>,
    /// Page users land on after login. Empty means the platform default.
    #[serde(default)]
    pub landing_page: Option<String>,
    /// log4js level (default: info)
    #[serde(default)]
    pub log_level: Option<String>,
    /// Legacy CPU limit in millicores, used only when `resources` is unset
    #[serde(default)]
    pub cpu_limits: Option<String>,
    /// Legacy memory limit in MiB, used only when `resources` is unset
    #[serde(default)]
    pub cpu_memory: Option<String>,
    /// Legacy CPU request in millicores, used only when `resources` is unset
    #[serde(default)]
    pub request_limits: Option<String>,
    /// Legacy memory request in MiB, used only when `resources` is unset
    #[serde(default)]
    pub request_memory: Option<String>,
}

/// Platform-wide configuration consumed by the console
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Image pull secret attached to the service account
    #[serde(default)]
    pub pull_secret: Option<String>,
    /// Identity provider endpoint
    #[serde(default)]
    pub identity_provider_url: Option<String>,
    /// Auth service endpoint
    #[serde(default)]
    pub auth_service_url: Option<String>,
    /// Platform router endpoint
    #[serde(default)]
    pub router_url: Option<String>,
    /// Platform release the console reports and licenses against
    #[serde(default)]
    pub cloud_pak_version: Option<String>,
    /// Default administrator user name
    #[serde(default)]
    pub default_admin_user: Option<String>,
    /// Session polling interval in milliseconds (default: 5000)
    #[serde(default)]
    pub session_polling_interval: Option<u32>,
    /// Enabled authentication modes
    #[serde(default)]
    pub auth: AuthConfig,
    /// Send anonymous usage analytics
    #[serde(default)]
    pub send_analytics: bool,
}

/// Authentication modes offered on the login page
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub default_auth: bool,
    #[serde(default)]
    pub enterprise_ldap: bool,
    #[serde(default)]
    pub enterprise_saml: bool,
    #[serde(default)]
    pub os_auth: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_auth: true,
            enterprise_ldap: false,
            enterprise_saml: false,
            os_auth: false,
        }
    }
}

/// Horizontal scaling configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalingConfig {
    /// Create a HorizontalPodAutoscaler for the workload
    #[serde(default)]
    pub enabled: bool,
    /// Upper replica bound (default: 3)
    #[serde(default)]
    pub max_replicas: Option<i32>,
}

/// Container resource sizing
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq)]
pub struct ResourceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceValues>,
}

/// Quantities for one side (requests or limits) of the container sizing
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq)]
pub struct ResourceValues {
    /// CPU quantity (e.g., "300m", "1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity (e.g., "512Mi", "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// Ephemeral storage quantity (e.g., "256Mi")
    #[serde(
        default,
        rename = "ephemeral-storage",
        skip_serializing_if = "Option::is_none"
    )]
    pub ephemeral_storage: Option<String>,
}

/// Default value for boolean true
pub fn default_true() -> bool {
    true
}
