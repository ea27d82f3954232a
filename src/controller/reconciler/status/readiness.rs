//! Kind-specific readiness predicates.

use crate::crd::{Certificate, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

/// The Deployment reports `Available=True`
#[must_use]
pub fn deployment_ready(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Available" && c.status == "True")
        })
}

/// cert-manager reports `Ready=True`
#[must_use]
pub fn certificate_ready(certificate: &Certificate) -> bool {
    certificate.status.as_ref().is_some_and(|s| {
        s.conditions
            .iter()
            .any(|c| c.r#type == "Ready" && c.status == "True")
    })
}

/// No router refused admission
#[must_use]
pub fn route_ready(route: &Route) -> bool {
    route.status.as_ref().is_none_or(|status| {
        status.ingress.iter().all(|ingress| {
            ingress
                .conditions
                .iter()
                .filter(|c| c.r#type == "Admitted")
                .all(|c| c.status == "True")
        })
    })
}

/// A cluster IP has been assigned
#[must_use]
pub fn service_ready(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .is_some_and(|ip| !ip.is_empty())
}

/// Kinds without a readiness signal are ready once they exist
#[must_use]
pub fn exists<K>(_object: &K) -> bool {
    true
}
