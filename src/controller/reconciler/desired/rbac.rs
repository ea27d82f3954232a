//! Service identity and namespace-local access control of the console workload.

use super::Inputs;
use crate::constants::APP_NAME;
use k8s_openapi::api::core::v1::{LocalObjectReference, ServiceAccount};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| Some(items.iter().map(|s| (*s).to_string()).collect());
    PolicyRule {
        api_groups: owned(api_groups),
        resources: owned(resources),
        verbs: owned(verbs).unwrap_or_default(),
        ..Default::default()
    }
}

#[must_use]
pub fn service_account(inputs: &Inputs<'_>) -> ServiceAccount {
    ServiceAccount {
        metadata: inputs.metadata(APP_NAME),
        image_pull_secrets: inputs.settings.pull_secret.as_ref().map(|name| {
            vec![LocalObjectReference {
                name: name.clone(),
            }]
        }),
        ..Default::default()
    }
}

/// Read access the console needs to render navigation and cluster information
#[must_use]
pub fn role(inputs: &Inputs<'_>) -> Role {
    Role {
        metadata: inputs.metadata(APP_NAME),
        rules: Some(vec![
            rule(&[""], &["configmaps", "secrets", "services"], &["get", "list", "watch"]),
            rule(&["route.openshift.io"], &["routes"], &["get", "list", "watch"]),
            rule(
                &["foundation.octopilot.io"],
                &["navconfigurations"],
                &["get", "list", "watch"],
            ),
        ]),
    }
}

#[must_use]
pub fn role_binding(inputs: &Inputs<'_>) -> RoleBinding {
    RoleBinding {
        metadata: inputs.metadata(APP_NAME),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: APP_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: None,
            kind: "ServiceAccount".to_string(),
            name: APP_NAME.to_string(),
            namespace: Some(inputs.namespace().to_string()),
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{instance, openshift};
    use super::super::UtilizationPolicy;
    use super::*;
    use crate::crd::ConsoleUISpec;

    #[test]
    fn test_pull_secret_only_when_configured() {
        let facts = openshift();
        let bare = instance(ConsoleUISpec::default());
        let inputs = Inputs::new(&bare, &facts, UtilizationPolicy::default()).unwrap();
        assert!(service_account(&inputs).image_pull_secrets.is_none());

        let mut spec = ConsoleUISpec::default();
        spec.global_config.pull_secret = Some("registry-creds".to_string());
        let configured = instance(spec);
        let inputs = Inputs::new(&configured, &facts, UtilizationPolicy::default()).unwrap();
        let secrets = service_account(&inputs).image_pull_secrets.unwrap();
        assert_eq!(secrets[0].name, "registry-creds");
    }

    #[test]
    fn test_binding_targets_service_account_in_namespace() {
        let facts = openshift();
        let instance = instance(ConsoleUISpec::default());
        let inputs = Inputs::new(&instance, &facts, UtilizationPolicy::default()).unwrap();
        let binding = role_binding(&inputs);
        assert_eq!(binding.role_ref.name, APP_NAME);
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.kind, "ServiceAccount");
        assert_eq!(subject.namespace.as_deref(), Some("platform"));
        assert_eq!(role(&inputs).rules.unwrap().len(), 3);
    }
}
