//! # External Resource Types
//!
//! Typed views of resources whose CRDs are installed by other components
//! (OpenShift routing and console, cert-manager, the platform navigation service).
//!
//! Only the sub-schema this operator reads or writes is modelled. Objects are
//! decoded once at the store boundary; everything downstream works on these types.

use serde::{Deserialize, Serialize};

/// OpenShift Route (`route.openshift.io/v1`)
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Route",
    group = "route.openshift.io",
    version = "v1",
    namespaced,
    status = "RouteStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// External host. Immutable once admitted by the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub to: RouteTargetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Named service port
    pub target_port: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub termination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ca_certificate: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub router_name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<ResourceCondition>,
}

/// cert-manager Certificate (`cert-manager.io/v1`)
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Certificate",
    group = "cert-manager.io",
    version = "v1",
    namespaced,
    status = "CertificateStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub common_name: String,
    pub secret_name: String,
    #[serde(default)]
    pub dns_names: Vec<String>,
    pub issuer_ref: IssuerReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    #[serde(default)]
    pub conditions: Vec<ResourceCondition>,
}

/// Condition shape shared by routes and certificates
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCondition {
    pub r#type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// OpenShift console link (`console.openshift.io/v1`, cluster-scoped)
///
/// Cannot carry an owner reference to a namespaced ConsoleUI, so its lifetime is
/// guarded by a finalizer on the owning instance instead.
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(kind = "ConsoleLink", group = "console.openshift.io", version = "v1")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLinkSpec {
    pub href: String,
    pub text: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_menu: Option<ApplicationMenu>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMenu {
    pub section: String,
    #[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Platform navigation configuration (`foundation.octopilot.io/v1`)
///
/// Several operators contribute items to the same object; only the items and
/// licenses this operator generates are converged.
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "NavConfiguration",
    group = "foundation.octopilot.io",
    version = "v1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct NavConfigurationSpec {
    #[serde(default)]
    pub nav_items: Vec<NavItem>,
    #[serde(default)]
    pub about: About,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    pub id: String,
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct About {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
}
