//! # Console Workload
//!
//! The Deployment running the console. Container configuration is carried in an
//! [`EnvConfig`] keyed by variable name and rendered in name order, so nothing
//! depends on the position of a variable in the container spec.

use super::Inputs;
use crate::constants::{
    APP_NAME, APP_PORT, CERTIFICATE_SECRET_NAME, LOG4JS_CONFIGMAP_NAME,
    OIDC_CREDENTIALS_SECRET_NAME, SELECTOR_LABEL,
};
use crate::controller::reconciler::desired::network::HTTPS_PORT_NAME;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, HTTPGetAction, ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, SeccompProfile, SecretKeySelector, SecretVolumeSource, SecurityContext,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

const LOG4JS_MOUNT_PATH: &str = "/etc/console-ui/log4js";
const CERT_MOUNT_PATH: &str = "/etc/console-ui/certs";
const HEALTH_PATH: &str = "/healthz";

/// Value source of one container environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    SecretKey { secret: String, key: String },
    FieldPath(String),
}

impl EnvValue {
    fn into_env_var(self, name: String) -> EnvVar {
        match self {
            EnvValue::Literal(value) => EnvVar {
                name,
                value: Some(value),
                value_from: None,
            },
            EnvValue::SecretKey { secret, key } => EnvVar {
                name,
                value: None,
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        key,
                        name: secret,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
            EnvValue::FieldPath(field_path) => EnvVar {
                name,
                value: None,
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
        }
    }
}

/// Container environment keyed by variable name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    vars: BTreeMap<String, EnvValue>,
}

impl EnvConfig {
    pub fn set(&mut self, name: &str, value: EnvValue) -> &mut Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    /// Set a literal; empty values are skipped because the API server drops them
    pub fn literal(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if value.is_empty() {
            self.vars.remove(name);
        } else {
            self.vars.insert(name.to_string(), EnvValue::Literal(value));
        }
        self
    }

    pub fn flag(&mut self, name: &str, value: bool) -> &mut Self {
        self.literal(name, value.to_string())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.vars.get(name)
    }

    /// Environment of the console container
    #[must_use]
    pub fn for_console(inputs: &Inputs<'_>) -> Self {
        let settings = &inputs.settings;
        let facts = inputs.facts;
        let mut env = Self::default();
        env.literal("NODE_ENV", "production")
            .literal("PORT", APP_PORT.to_string())
            .literal("CONTEXT_PATH", settings.ingress_path.as_str())
            .literal("SERVICE_NAME", settings.service_name.as_str())
            .literal("LANDING_PAGE", settings.landing_page.as_str())
            .literal("IDENTITY_PROVIDER_URL", settings.identity_provider_url.as_str())
            .literal("AUTH_SERVICE_URL", settings.auth_service_url.as_str())
            .literal("ROUTER_URL", settings.router_url.as_str())
            .literal("CLOUD_PAK_VERSION", settings.cloud_pak_version.as_str())
            .literal("DEFAULT_ADMIN_USER", settings.default_admin_user.as_str())
            .literal(
                "SESSION_POLLING_INTERVAL",
                settings.session_polling_interval.to_string(),
            )
            .flag("AUTH_DEFAULT", settings.auth.default_auth)
            .flag("AUTH_ENTERPRISE_LDAP", settings.auth.enterprise_ldap)
            .flag("AUTH_ENTERPRISE_SAML", settings.auth.enterprise_saml)
            .flag("AUTH_OS", settings.auth.os_auth)
            .flag("SEND_ANALYTICS", settings.send_analytics)
            .flag("ENABLE_METRICS", settings.metrics_collection)
            .literal("CLUSTER_NAME", facts.cluster_name.as_str())
            .literal("CLUSTER_TYPE", facts.platform())
            .literal("CLUSTER_ADDRESS", facts.cluster_address.clone().unwrap_or_default())
            .literal("LOG4JS_CONFIG", format!("{LOG4JS_MOUNT_PATH}/log4js.json"))
            .literal("TLS_CERT_PATH", format!("{CERT_MOUNT_PATH}/tls.crt"))
            .literal("TLS_KEY_PATH", format!("{CERT_MOUNT_PATH}/tls.key"))
            .set(
                "POD_NAMESPACE",
                EnvValue::FieldPath("metadata.namespace".to_string()),
            )
            .set(
                "OIDC_CLIENT_ID",
                EnvValue::SecretKey {
                    secret: OIDC_CREDENTIALS_SECRET_NAME.to_string(),
                    key: "CLIENT_ID".to_string(),
                },
            )
            .set(
                "OIDC_CLIENT_SECRET",
                EnvValue::SecretKey {
                    secret: OIDC_CREDENTIALS_SECRET_NAME.to_string(),
                    key: "CLIENT_SECRET".to_string(),
                },
            );
        env
    }

    /// Render in name order
    #[must_use]
    pub fn into_env_vars(self) -> Vec<EnvVar> {
        self.vars
            .into_iter()
            .map(|(name, value)| value.into_env_var(name))
            .collect()
    }
}

fn quantities(cpu: &str, memory: &str, ephemeral_storage: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
        (
            "ephemeral-storage".to_string(),
            Quantity(ephemeral_storage.to_string()),
        ),
    ])
}

fn probe(initial_delay_seconds: i32, period_seconds: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(HEALTH_PATH.to_string()),
            port: IntOrString::String(HTTPS_PORT_NAME.to_string()),
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        period_seconds: Some(period_seconds),
        timeout_seconds: Some(5),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        read_only: Some(true),
        ..Default::default()
    }
}

fn container(inputs: &Inputs<'_>) -> Container {
    let sizing = &inputs.settings.sizing;
    Container {
        name: APP_NAME.to_string(),
        image: Some(inputs.settings.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(HTTPS_PORT_NAME.to_string()),
            container_port: APP_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(EnvConfig::for_console(inputs).into_env_vars()),
        resources: Some(ResourceRequirements {
            requests: Some(quantities(
                &sizing.requests.cpu,
                &sizing.requests.memory,
                &sizing.requests.ephemeral_storage,
            )),
            limits: Some(quantities(
                &sizing.limits.cpu,
                &sizing.limits.memory,
                &sizing.limits.ephemeral_storage,
            )),
            ..Default::default()
        }),
        readiness_probe: Some(probe(10, 10)),
        liveness_probe: Some(probe(30, 20)),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            capabilities: Some(Capabilities {
                drop: Some(vec!["ALL".to_string()]),
                add: None,
            }),
            privileged: Some(false),
            read_only_root_filesystem: Some(true),
            run_as_non_root: Some(true),
            seccomp_profile: Some(SeccompProfile {
                type_: "RuntimeDefault".to_string(),
                localhost_profile: None,
            }),
            ..Default::default()
        }),
        volume_mounts: Some(vec![
            volume_mount("log4js", LOG4JS_MOUNT_PATH),
            volume_mount("certs", CERT_MOUNT_PATH),
            VolumeMount {
                name: "tmp".to_string(),
                mount_path: "/tmp".to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

fn volumes() -> Vec<Volume> {
    vec![
        Volume {
            name: "log4js".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: LOG4JS_CONFIGMAP_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "certs".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(CERTIFICATE_SECRET_NAME.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "tmp".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ]
}

fn pod_annotations(inputs: &Inputs<'_>) -> Option<BTreeMap<String, String>> {
    inputs.settings.metrics_collection.then(|| {
        BTreeMap::from([
            ("prometheus.io/scrape".to_string(), "true".to_string()),
            ("prometheus.io/port".to_string(), APP_PORT.to_string()),
            ("prometheus.io/scheme".to_string(), "https".to_string()),
        ])
    })
}

/// Console Deployment
///
/// With autoscaling enabled the replica count is left to the autoscaler.
#[must_use]
pub fn deployment(inputs: &Inputs<'_>) -> Deployment {
    let selector = BTreeMap::from([(SELECTOR_LABEL.to_string(), APP_NAME.to_string())]);
    let mut pod_labels = inputs.labels();
    pod_labels.extend(selector.clone());

    Deployment {
        metadata: inputs.metadata(APP_NAME),
        spec: Some(DeploymentSpec {
            replicas: (!inputs.settings.scaling_enabled).then_some(inputs.settings.replicas),
            selector: LabelSelector {
                match_labels: Some(selector),
                match_expressions: None,
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_surge: Some(IntOrString::Int(1)),
                    max_unavailable: Some(IntOrString::Int(0)),
                }),
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    annotations: pod_annotations(inputs),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(APP_NAME.to_string()),
                    containers: vec![container(inputs)],
                    volumes: Some(volumes()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{instance, openshift};
    use super::super::UtilizationPolicy;
    use super::*;
    use crate::crd::ConsoleUISpec;

    fn build(spec: ConsoleUISpec) -> Deployment {
        let instance = instance(spec);
        let facts = openshift();
        let inputs = Inputs::new(&instance, &facts, UtilizationPolicy::default()).unwrap();
        deployment(&inputs)
    }

    fn console_container(deployment: &Deployment) -> &Container {
        &deployment
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0]
    }

    #[test]
    fn test_env_rendered_sorted_and_without_empty_values() {
        let deployment = build(ConsoleUISpec::default());
        let env = console_container(&deployment).env.clone().unwrap();
        let names: Vec<_> = env.iter().map(|e| e.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        // No landing page configured and no admin hub
        assert!(!names.contains(&"LANDING_PAGE".to_string()));
        assert!(env.iter().all(|e| e.value.as_deref() != Some("")));
    }

    #[test]
    fn test_env_config_is_keyed_by_name() {
        let mut env = EnvConfig::default();
        env.literal("B", "2").literal("A", "1").literal("B", "3");
        assert_eq!(env.get("B"), Some(&EnvValue::Literal("3".to_string())));
        env.literal("A", "");
        assert_eq!(env.get("A"), None);
        let vars = env.into_env_vars();
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_secret_backed_variables() {
        let deployment = build(ConsoleUISpec::default());
        let env = console_container(&deployment).env.clone().unwrap();
        let client_id = env.iter().find(|e| e.name == "OIDC_CLIENT_ID").unwrap();
        let selector = client_id
            .value_from
            .as_ref()
            .and_then(|s| s.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name, OIDC_CREDENTIALS_SECRET_NAME);
        assert_eq!(selector.key, "CLIENT_ID");
    }

    #[test]
    fn test_replicas_left_to_autoscaler_when_scaling() {
        let fixed = build(ConsoleUISpec {
            replicas: Some(2),
            ..Default::default()
        });
        assert_eq!(fixed.spec.unwrap().replicas, Some(2));

        let mut spec = ConsoleUISpec::default();
        spec.scaling.enabled = true;
        assert_eq!(build(spec).spec.unwrap().replicas, None);
    }

    #[test]
    fn test_default_sizing_and_metrics_annotations() {
        let deployment = build(ConsoleUISpec {
            enable_metrics_collection: true,
            ..Default::default()
        });
        let resources = console_container(&deployment).resources.clone().unwrap();
        assert_eq!(
            resources.requests.unwrap().get("memory"),
            Some(&Quantity("512Mi".to_string()))
        );
        let annotations = deployment
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .annotations
            .unwrap();
        assert_eq!(annotations.get("prometheus.io/scrape").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_pod_labels_include_selector() {
        let deployment = build(ConsoleUISpec::default());
        let spec = deployment.spec.unwrap();
        let labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(labels.get(SELECTOR_LABEL).map(String::as_str), Some(APP_NAME));
        assert_eq!(spec.selector.match_labels.unwrap().len(), 1);
    }
}
