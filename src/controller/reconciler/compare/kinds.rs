//! Field tables for every managed kind.

use super::{Field, Managed};
use crate::controller::reconciler::preserve;
use crate::crd::{Certificate, ConsoleLink, NavConfiguration, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};

const LABELS: Field = Field::defaulted("/metadata/labels");

impl Managed for ConfigMap {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::owned("/data")];
        FIELDS
    }
}

impl Managed for ServiceAccount {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::owned("/imagePullSecrets")];
        FIELDS
    }

    fn preserve(observed: &Self, desired: &mut Self) {
        preserve::service_account(observed, desired);
    }
}

impl Managed for Role {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::owned("/rules")];
        FIELDS
    }
}

impl Managed for RoleBinding {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            LABELS,
            Field::immutable("/roleRef"),
            Field::owned("/subjects"),
        ];
        FIELDS
    }
}

impl Managed for Certificate {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::defaulted("/spec")];
        FIELDS
    }
}

// clusterIP is assigned by the API server and never compared
impl Managed for Service {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            LABELS,
            Field::defaulted("/spec/ports"),
            Field::owned("/spec/selector"),
            Field::defaulted("/spec/type"),
        ];
        FIELDS
    }
}

impl Managed for Deployment {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::owned("/metadata/labels"),
            Field::immutable("/spec/selector"),
            Field::defaulted("/spec/replicas"),
            Field::defaulted("/spec/strategy"),
            Field::defaulted("/spec/template"),
            Field::owned("/spec/template/metadata/labels"),
        ];
        FIELDS
    }

    fn preserve(observed: &Self, desired: &mut Self) {
        preserve::deployment(observed, desired);
    }
}

impl Managed for HorizontalPodAutoscaler {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::defaulted("/spec")];
        FIELDS
    }
}

// The router may assign a host; a generated host is immutable once set
impl Managed for Route {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            LABELS,
            Field::immutable("/spec/host"),
            Field::owned("/spec/path"),
            Field::defaulted("/spec/to"),
            Field::owned("/spec/port"),
            Field::defaulted("/spec/tls"),
            Field::defaulted("/spec/wildcardPolicy"),
        ];
        FIELDS
    }
}

impl Managed for Ingress {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            LABELS,
            Field::defaulted("/metadata/annotations"),
            Field::defaulted("/spec"),
        ];
        FIELDS
    }
}

impl Managed for NavConfiguration {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            LABELS,
            Field::owned("/spec/navItems"),
            Field::defaulted("/spec/about"),
        ];
        FIELDS
    }

    fn preserve(observed: &Self, desired: &mut Self) {
        preserve::nav_configuration(observed, desired);
    }
}

impl Managed for ConsoleLink {
    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[LABELS, Field::owned("/spec")];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::super::{detect, Drift};
    use super::*;
    use serde_json::json;

    fn compare<K: Managed>(observed: &K, mut desired: K) -> Drift {
        K::preserve(observed, &mut desired);
        detect(
            K::fields(),
            &serde_json::to_value(&desired).unwrap(),
            &serde_json::to_value(observed).unwrap(),
        )
    }

    #[test]
    fn test_service_ignores_assigned_cluster_ip() {
        let desired: Service = serde_json::from_value(json!({
            "metadata": {"name": "console-ui", "labels": {"app": "console-ui"}},
            "spec": {"ports": [{"name": "https", "port": 3000}], "selector": {"k8s-app": "console-ui"}}
        }))
        .unwrap();
        let observed: Service = serde_json::from_value(json!({
            "metadata": {"name": "console-ui", "labels": {"app": "console-ui"}, "resourceVersion": "4"},
            "spec": {
                "clusterIP": "10.0.0.12",
                "type": "ClusterIP",
                "ports": [{"name": "https", "port": 3000, "protocol": "TCP", "targetPort": 3000}],
                "selector": {"k8s-app": "console-ui"}
            }
        }))
        .unwrap();
        assert_eq!(compare(&observed, desired), Drift::InSync);
    }

    #[test]
    fn test_role_binding_role_ref_change_requires_recreate() {
        let binding = |role: &str| -> RoleBinding {
            serde_json::from_value(json!({
                "metadata": {"name": "console-ui"},
                "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": role},
                "subjects": [{"kind": "ServiceAccount", "name": "console-ui"}]
            }))
            .unwrap()
        };
        assert_eq!(
            compare(&binding("old"), binding("console-ui")),
            Drift::Immutable("/roleRef")
        );
    }

    #[test]
    fn test_route_host_change_requires_recreate() {
        let route = |host: &str| -> Route {
            serde_json::from_value(json!({
                "apiVersion": "route.openshift.io/v1",
                "kind": "Route",
                "metadata": {"name": "console-ui"},
                "spec": {"host": host, "path": "/common-nav", "to": {"kind": "Service", "name": "console-ui"}}
            }))
            .unwrap()
        };
        assert_eq!(
            compare(&route("old.example.com"), route("new.example.com")),
            Drift::Immutable("/spec/host")
        );
        assert_eq!(
            compare(&route("same.example.com"), route("same.example.com")),
            Drift::InSync
        );
    }

    #[test]
    fn test_deployment_rotation_marker_does_not_drift() {
        let observed: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "console-ui", "labels": {"app": "x", "certmanager.k8s.io/time-restarted": "t1"}},
            "spec": {
                "replicas": 1,
                "selector": {"matchLabels": {"k8s-app": "console-ui"}},
                "template": {
                    "metadata": {"labels": {"k8s-app": "console-ui", "certmanager.k8s.io/time-restarted": "t1"}},
                    "spec": {"containers": [{"name": "console-ui", "image": "img:1", "terminationMessagePath": "/dev/termination-log"}]}
                }
            }
        }))
        .unwrap();
        let desired: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "console-ui", "labels": {"app": "x"}},
            "spec": {
                "replicas": 1,
                "selector": {"matchLabels": {"k8s-app": "console-ui"}},
                "template": {
                    "metadata": {"labels": {"k8s-app": "console-ui"}},
                    "spec": {"containers": [{"name": "console-ui", "image": "img:1"}]}
                }
            }
        }))
        .unwrap();
        assert_eq!(compare(&observed, desired.clone()), Drift::InSync);

        // Without preservation the marker shows up as drift
        assert!(!detect(
            Deployment::fields(),
            &serde_json::to_value(&desired).unwrap(),
            &serde_json::to_value(&observed).unwrap(),
        )
        .is_in_sync());
    }

    #[test]
    fn test_deployment_image_change_is_mutable_drift() {
        let deployment = |image: &str| -> Deployment {
            serde_json::from_value(json!({
                "metadata": {"name": "console-ui"},
                "spec": {
                    "selector": {"matchLabels": {"k8s-app": "console-ui"}},
                    "template": {"spec": {"containers": [{"name": "console-ui", "image": image}]}}
                }
            }))
            .unwrap()
        };
        assert_eq!(
            compare(&deployment("img:1"), deployment("img:2")),
            Drift::Mutable(vec!["/spec/template"])
        );
    }
}
