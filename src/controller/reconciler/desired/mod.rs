//! # Desired-State Generators
//!
//! Pure functions, one per managed kind, that build the target object from a
//! `ConsoleUI` instance and the environment facts of the current pass.
//!
//! ## Module Structure
//!
//! - `settings.rs` - Defaults applied once per pass
//! - `config.rs` - log4js ConfigMap
//! - `rbac.rs` - ServiceAccount, Role, RoleBinding
//! - `certificate.rs` - Serving certificate
//! - `network.rs` - Service, Routes, Ingresses
//! - `workload.rs` - Deployment and its named environment map
//! - `autoscaling.rs` - HorizontalPodAutoscaler and the utilization policy
//! - `navigation.rs` - NavConfiguration and ConsoleLink

mod autoscaling;
mod certificate;
mod config;
mod navigation;
mod network;
mod rbac;
mod settings;
mod workload;

pub use autoscaling::{horizontal_pod_autoscaler, UtilizationPolicy};
pub use certificate::certificate;
pub use config::log4js_config_map;
pub use navigation::{console_link, console_link_name, nav_configuration};
pub use network::{ingresses, routes, service};
pub use rbac::{role, role_binding, service_account};
pub use settings::{AuthSettings, Quantities, ResolvedSettings, Sizing};
pub use workload::{deployment, EnvConfig, EnvValue};

use crate::constants::{APP_NAME, OPERATOR_NAME};
use crate::controller::reconciler::environment::EnvironmentFacts;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::ConsoleUI;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const NAME_LABEL: &str = "app.kubernetes.io/name";
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Everything a generator reads
#[derive(Debug)]
pub struct Inputs<'a> {
    pub instance: &'a ConsoleUI,
    pub facts: &'a EnvironmentFacts,
    pub settings: ResolvedSettings,
    pub utilization: UtilizationPolicy,
    namespace: String,
}

impl<'a> Inputs<'a> {
    /// Resolve the instance once for every generator of a pass
    ///
    /// # Errors
    ///
    /// Returns `InvalidObject` when the instance has no namespace or carries an
    /// invalid sizing value.
    pub fn new(
        instance: &'a ConsoleUI,
        facts: &'a EnvironmentFacts,
        utilization: UtilizationPolicy,
    ) -> Result<Self, ReconcilerError> {
        let namespace = instance
            .namespace()
            .ok_or_else(|| ReconcilerError::invalid("ConsoleUI", "instance has no namespace"))?;
        Ok(Self {
            instance,
            facts,
            settings: ResolvedSettings::resolve(&instance.spec, facts)?,
            utilization,
            namespace,
        })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Standard app labels merged over the user labels
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.instance.spec.labels.clone();
        labels.insert(NAME_LABEL.to_string(), APP_NAME.to_string());
        labels.insert(INSTANCE_LABEL.to_string(), self.instance.name_any());
        labels.insert(MANAGED_BY_LABEL.to_string(), OPERATOR_NAME.to_string());
        labels
    }

    /// Name, instance namespace and standard labels
    #[must_use]
    pub fn metadata(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            ..Default::default()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::crd::ConsoleUISpec;

    #[test]
    fn test_standard_labels_win_over_user_labels() {
        let mut spec = ConsoleUISpec::default();
        spec.labels.insert("team".to_string(), "platform".to_string());
        spec.labels.insert(NAME_LABEL.to_string(), "hijack".to_string());
        let instance = instance(spec);
        let facts = openshift();
        let inputs = Inputs::new(&instance, &facts, UtilizationPolicy::default()).unwrap();

        let labels = inputs.labels();
        assert_eq!(labels.get("team").map(String::as_str), Some("platform"));
        assert_eq!(labels.get(NAME_LABEL).map(String::as_str), Some(APP_NAME));
        assert_eq!(labels.get(INSTANCE_LABEL).map(String::as_str), Some("example-console"));
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(OPERATOR_NAME));
    }

    #[test]
    fn test_instance_without_namespace_is_invalid() {
        let instance = ConsoleUI::new("orphan", ConsoleUISpec::default());
        let facts = EnvironmentFacts::default();
        let err = Inputs::new(&instance, &facts, UtilizationPolicy::default()).unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidObject { .. }));
    }

    #[test]
    fn test_metadata_carries_namespace_and_labels() {
        let instance = instance(ConsoleUISpec::default());
        let facts = openshift();
        let inputs = Inputs::new(&instance, &facts, UtilizationPolicy::default()).unwrap();
        let meta = inputs.metadata("console-ui");
        assert_eq!(meta.name.as_deref(), Some("console-ui"));
        assert_eq!(meta.namespace.as_deref(), Some("platform"));
        assert_eq!(meta.labels, Some(inputs.labels()));
    }
}
