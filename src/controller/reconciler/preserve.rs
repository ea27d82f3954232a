//! # Field Preservation
//!
//! Copies values written by other actors from the observed object into the desired
//! object before comparison, so the reconciler never fights another controller over
//! the same field.
//!
//! Known writers:
//! - the certificate rotation component stamps `certmanager.k8s.io/time-restarted`
//!   on the workload and its pod template to force a rollout
//! - the namespace-scope component writes `nss.octopilot.io/namespaceList`
//! - the platform appends image pull secrets to service accounts
//! - other operators contribute navigation items and licenses to the shared
//!   NavConfiguration
//! - an administrator may scale the workload to zero

use crate::constants::{NAMESPACE_SCOPE_ANNOTATION, TIME_RESTARTED_LABEL};
use crate::crd::NavConfiguration;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use std::collections::BTreeMap;

/// Copy `key` from `observed` into `desired` when the observed map has it
///
/// Overwrites whatever the generator produced for that key.
pub fn preserve(key: &str, observed: &BTreeMap<String, String>, desired: &mut BTreeMap<String, String>) {
    if let Some(value) = observed.get(key) {
        desired.insert(key.to_string(), value.clone());
    }
}

/// [`preserve`] over the optional maps Kubernetes metadata uses
pub fn preserve_in(
    key: &str,
    observed: Option<&BTreeMap<String, String>>,
    desired: &mut Option<BTreeMap<String, String>>,
) {
    if let Some(observed) = observed {
        if observed.contains_key(key) {
            preserve(key, observed, desired.get_or_insert_with(BTreeMap::new));
        }
    }
}

/// Rotation marker, namespace-scope annotation and scale-to-zero
pub fn deployment(observed: &Deployment, desired: &mut Deployment) {
    preserve_in(
        TIME_RESTARTED_LABEL,
        observed.metadata.labels.as_ref(),
        &mut desired.metadata.labels,
    );
    preserve_in(
        NAMESPACE_SCOPE_ANNOTATION,
        observed.metadata.annotations.as_ref(),
        &mut desired.metadata.annotations,
    );

    let Some(observed_spec) = observed.spec.as_ref() else {
        return;
    };
    let Some(desired_spec) = desired.spec.as_mut() else {
        return;
    };

    if observed_spec.replicas == Some(0) && desired_spec.replicas.is_some() {
        desired_spec.replicas = Some(0);
    }

    if let Some(observed_meta) = observed_spec.template.metadata.as_ref() {
        let desired_meta = desired_spec.template.metadata.get_or_insert_with(Default::default);
        preserve_in(
            TIME_RESTARTED_LABEL,
            observed_meta.labels.as_ref(),
            &mut desired_meta.labels,
        );
        preserve_in(
            NAMESPACE_SCOPE_ANNOTATION,
            observed_meta.annotations.as_ref(),
            &mut desired_meta.annotations,
        );
    }
}

/// Keep pull secrets the platform attached alongside the generated ones
pub fn service_account(observed: &ServiceAccount, desired: &mut ServiceAccount) {
    let Some(observed_secrets) = observed.image_pull_secrets.as_ref() else {
        return;
    };
    let desired_secrets = desired.image_pull_secrets.get_or_insert_with(Vec::new);
    for secret in observed_secrets {
        if !desired_secrets.iter().any(|s| s.name == secret.name) {
            desired_secrets.push(secret.clone());
        }
    }
}

/// Keep navigation items (by id) and licenses contributed by other operators
pub fn nav_configuration(observed: &NavConfiguration, desired: &mut NavConfiguration) {
    for item in &observed.spec.nav_items {
        if !desired.spec.nav_items.iter().any(|i| i.id == item.id) {
            desired.spec.nav_items.push(item.clone());
        }
    }
    for license in &observed.spec.about.licenses {
        if !desired.spec.about.licenses.contains(license) {
            desired.spec.about.licenses.push(license.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{NavConfigurationSpec, NavItem};
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{LocalObjectReference, PodTemplateSpec};
    use kube::api::ObjectMeta;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn deployment_with(replicas: Option<i32>, pod_labels: &[(&str, &str)]) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("console-ui".to_string()),
                labels: Some(labels(pod_labels)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas,
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels(pod_labels)),
                        ..Default::default()
                    }),
                    spec: None,
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_preserve_copies_present_key() {
        let observed = labels(&[("a", "observed"), ("b", "x")]);
        let mut desired = labels(&[("a", "generated")]);
        preserve("a", &observed, &mut desired);
        assert_eq!(desired.get("a").map(String::as_str), Some("observed"));
        assert!(!desired.contains_key("b"));
    }

    #[test]
    fn test_preserve_absent_key_leaves_desired() {
        let observed = labels(&[]);
        let mut desired = labels(&[("a", "generated")]);
        preserve("a", &observed, &mut desired);
        assert_eq!(desired.get("a").map(String::as_str), Some("generated"));
    }

    #[test]
    fn test_preserve_in_creates_missing_map() {
        let observed = labels(&[("k", "v")]);
        let mut desired = None;
        preserve_in("k", Some(&observed), &mut desired);
        assert_eq!(desired, Some(labels(&[("k", "v")])));

        let mut untouched = None;
        preserve_in("missing", Some(&observed), &mut untouched);
        assert_eq!(untouched, None);
    }

    #[test]
    fn test_deployment_keeps_rotation_marker() {
        let observed = deployment_with(Some(1), &[("app", "x"), (TIME_RESTARTED_LABEL, "2026-01-01")]);
        let mut desired = deployment_with(Some(1), &[("app", "x")]);
        deployment(&observed, &mut desired);

        let top = desired.metadata.labels.as_ref().unwrap();
        assert_eq!(top.get(TIME_RESTARTED_LABEL).map(String::as_str), Some("2026-01-01"));
        let pod = desired
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.labels.as_ref())
            .unwrap();
        assert_eq!(pod.get(TIME_RESTARTED_LABEL).map(String::as_str), Some("2026-01-01"));
    }

    #[test]
    fn test_deployment_keeps_scale_to_zero() {
        let observed = deployment_with(Some(0), &[]);
        let mut desired = deployment_with(Some(1), &[]);
        deployment(&observed, &mut desired);
        assert_eq!(desired.spec.unwrap().replicas, Some(0));
    }

    #[test]
    fn test_deployment_does_not_lower_nonzero_replicas() {
        let observed = deployment_with(Some(3), &[]);
        let mut desired = deployment_with(Some(1), &[]);
        deployment(&observed, &mut desired);
        assert_eq!(desired.spec.unwrap().replicas, Some(1));
    }

    #[test]
    fn test_service_account_unions_pull_secrets() {
        let observed = ServiceAccount {
            image_pull_secrets: Some(vec![
                LocalObjectReference {
                    name: "platform-dockercfg".to_string(),
                },
                LocalObjectReference {
                    name: "registry".to_string(),
                },
            ]),
            ..Default::default()
        };
        let mut desired = ServiceAccount {
            image_pull_secrets: Some(vec![LocalObjectReference {
                name: "registry".to_string(),
            }]),
            ..Default::default()
        };
        service_account(&observed, &mut desired);
        let names: Vec<_> = desired
            .image_pull_secrets
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["registry", "platform-dockercfg"]);
    }

    #[test]
    fn test_nav_configuration_unions_items_and_licenses() {
        let item = |id: &str| NavItem {
            id: id.to_string(),
            label: id.to_string(),
            url: format!("/{id}"),
            ..Default::default()
        };
        let mut observed = NavConfiguration::new("nav", NavConfigurationSpec::default());
        observed.spec.nav_items = vec![item("other"), item("console")];
        observed.spec.about.licenses = vec!["L-OTHER".to_string()];

        let mut desired = NavConfiguration::new("nav", NavConfigurationSpec::default());
        desired.spec.nav_items = vec![item("console")];
        desired.spec.about.licenses = vec!["L-CONSOLE".to_string()];

        nav_configuration(&observed, &mut desired);
        let ids: Vec<_> = desired.spec.nav_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["console", "other"]);
        assert_eq!(desired.spec.about.licenses, vec!["L-CONSOLE", "L-OTHER"]);
    }
}
