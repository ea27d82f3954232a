//! # CRD Tests
//!
//! Manifest generation and wire defaults of the `ConsoleUI` resource.

use console_ui_operator::prelude::*;
use kube::core::CustomResourceExt;

#[test]
fn test_crd_metadata() {
    let crd = ConsoleUI::crd();
    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("consoleuis.console-ui.octopilot.io")
    );
    assert_eq!(crd.spec.group, "console-ui.octopilot.io");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.versions.len(), 1);

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(version.subresources.as_ref().is_some_and(|s| s.status.is_some()));
    assert_eq!(
        crd.spec.names.short_names.as_deref(),
        Some(&["cui".to_string()][..])
    );
}

#[test]
fn test_crd_renders_as_yaml() {
    let yaml = serde_yaml::to_string(&ConsoleUI::crd()).unwrap();
    assert!(yaml.contains("kind: CustomResourceDefinition"));
    assert!(yaml.contains("consoleConfig"));
    assert!(yaml.contains("serviceStatus"));
}

#[test]
fn test_minimal_manifest_uses_defaults() {
    let manifest = r"
apiVersion: console-ui.octopilot.io/v1alpha1
kind: ConsoleUI
metadata:
  name: example-console
  namespace: platform
spec: {}
";
    let instance: ConsoleUI = serde_yaml::from_str(manifest).unwrap();

    assert_eq!(instance.spec.replicas, None);
    assert!(!instance.spec.scaling.enabled);
    assert!(instance.spec.global_config.auth.default_auth);
    assert!(!instance.spec.global_config.auth.enterprise_ldap);
    assert!(instance.spec.labels.is_empty());
    assert!(instance.status.is_none());
}

#[test]
fn test_full_manifest_parses() {
    let manifest = r#"
apiVersion: console-ui.octopilot.io/v1alpha1
kind: ConsoleUI
metadata:
  name: example-console
  namespace: platform
spec:
  consoleConfig:
    imageTag: 4.2.1
    ingressPath: /common-nav
    requestMemory: "256"
  globalConfig:
    cloudPakVersion: "4.0"
    auth:
      enterpriseLdap: true
  replicas: 2
  scaling:
    enabled: true
    maxReplicas: 4
  labels:
    team: platform
"#;
    let instance: ConsoleUI = serde_yaml::from_str(manifest).unwrap();

    assert_eq!(instance.spec.console_config.image_tag.as_deref(), Some("4.2.1"));
    assert_eq!(instance.spec.console_config.request_memory.as_deref(), Some("256"));
    assert_eq!(instance.spec.global_config.cloud_pak_version.as_deref(), Some("4.0"));
    assert!(instance.spec.global_config.auth.enterprise_ldap);
    // Unset modes keep their defaults
    assert!(instance.spec.global_config.auth.default_auth);
    assert_eq!(instance.spec.replicas, Some(2));
    assert_eq!(instance.spec.scaling.max_replicas, Some(4));
    assert_eq!(instance.spec.labels.get("team").map(String::as_str), Some("platform"));
}

#[test]
fn test_readiness_serializes_as_written_to_status() {
    let status = ServiceStatus {
        object_name: "example-console".to_string(),
        namespace: "platform".to_string(),
        api_version: "console-ui.octopilot.io/v1alpha1".to_string(),
        kind: "ConsoleUI".to_string(),
        status: Readiness::NotReady,
        managed_resources: Vec::new(),
    };
    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(value["status"], "NotReady");
    assert_eq!(value["objectName"], "example-console");
    assert_eq!(Readiness::Ready.to_string(), "Ready");
}
