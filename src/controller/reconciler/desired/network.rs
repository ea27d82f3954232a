//! # Network Exposure
//!
//! The in-cluster Service plus the two external entry points (UI path and OIDC
//! callback path). OpenShift clusters get re-encrypting Routes; CNCF clusters get
//! nginx Ingresses serving the same host and paths.

use super::Inputs;
use crate::constants::{
    APP_NAME, APP_PORT, CALLBACK_PATH, CALLBACK_ROUTE_NAME, ROUTE_NAME, SELECTOR_LABEL,
};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Name of the service port routes and ingresses target
pub const HTTPS_PORT_NAME: &str = "https";

/// (object name, served path) of both entry points
fn entry_points(inputs: &Inputs<'_>) -> [(&'static str, String); 2] {
    [
        (ROUTE_NAME, inputs.settings.ingress_path.clone()),
        (CALLBACK_ROUTE_NAME, CALLBACK_PATH.to_string()),
    ]
}

#[must_use]
pub fn service(inputs: &Inputs<'_>) -> Service {
    Service {
        metadata: inputs.metadata(APP_NAME),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(HTTPS_PORT_NAME.to_string()),
                port: APP_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(APP_PORT)),
                ..Default::default()
            }]),
            selector: Some(BTreeMap::from([(
                SELECTOR_LABEL.to_string(),
                APP_NAME.to_string(),
            )])),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// UI and callback Routes
///
/// # Errors
///
/// `DependencyNotReady` until the cluster address is known and the serving
/// certificate has been issued.
pub fn routes(inputs: &Inputs<'_>) -> Result<Vec<Route>, ReconcilerError> {
    let host = inputs.facts.cluster_address.clone().ok_or_else(|| {
        ReconcilerError::DependencyNotReady("cluster address for console routes".to_string())
    })?;
    let ca = inputs.facts.serving_ca.clone().ok_or_else(|| {
        ReconcilerError::DependencyNotReady("CA of the console serving certificate".to_string())
    })?;

    Ok(entry_points(inputs)
        .into_iter()
        .map(|(name, path)| {
            let mut route = Route::new(
                name,
                RouteSpec {
                    host: Some(host.clone()),
                    path: Some(path),
                    to: RouteTargetReference {
                        kind: "Service".to_string(),
                        name: APP_NAME.to_string(),
                        weight: Some(100),
                    },
                    port: Some(RoutePort {
                        target_port: HTTPS_PORT_NAME.to_string(),
                    }),
                    tls: Some(TlsConfig {
                        termination: "reencrypt".to_string(),
                        insecure_edge_termination_policy: Some("Redirect".to_string()),
                        destination_ca_certificate: Some(ca.clone()),
                    }),
                    wildcard_policy: Some("None".to_string()),
                },
            );
            route.metadata = inputs.metadata(name);
            route
        })
        .collect())
}

/// UI and callback Ingresses for CNCF clusters
///
/// Without a known cluster address the rules match any host.
#[must_use]
pub fn ingresses(inputs: &Inputs<'_>) -> Vec<Ingress> {
    let annotations = BTreeMap::from([
        ("kubernetes.io/ingress.class".to_string(), "nginx".to_string()),
        (
            "nginx.ingress.kubernetes.io/backend-protocol".to_string(),
            "HTTPS".to_string(),
        ),
        (
            "nginx.ingress.kubernetes.io/ssl-redirect".to_string(),
            "true".to_string(),
        ),
    ]);

    entry_points(inputs)
        .into_iter()
        .map(|(name, path)| {
            let mut metadata = inputs.metadata(name);
            metadata.annotations = Some(annotations.clone());
            Ingress {
                metadata,
                spec: Some(IngressSpec {
                    rules: Some(vec![IngressRule {
                        host: inputs.facts.cluster_address.clone(),
                        http: Some(HTTPIngressRuleValue {
                            paths: vec![HTTPIngressPath {
                                path: Some(path),
                                path_type: "Prefix".to_string(),
                                backend: IngressBackend {
                                    service: Some(IngressServiceBackend {
                                        name: APP_NAME.to_string(),
                                        port: Some(ServiceBackendPort {
                                            number: Some(APP_PORT),
                                            name: None,
                                        }),
                                    }),
                                    resource: None,
                                },
                            }],
                        }),
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect()
}
