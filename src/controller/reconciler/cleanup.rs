//! # Deprecated Resources
//!
//! Objects earlier releases created under names this release no longer uses.
//! Deletion is attempted on every pass; failures are logged and never fail the pass.

use crate::controller::reconciler::apply::Applier;
use crate::crd::{Certificate, NavConfiguration};
use crate::observability::metrics;
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::warn;

pub const DEPRECATED_API_INGRESS: &str = "console-ui-api";
pub const DEPRECATED_CONFIGMAP: &str = "console-ui-config";
pub const DEPRECATED_CERTIFICATE: &str = "console-ui-certificate";
pub const DEPRECATED_NAV_CONFIGURATION: &str = "console-ui-navconfig";

/// Best-effort removal; returns how many objects were deleted this pass
pub async fn remove_deprecated<S: ObjectStore>(store: &S, namespace: &str) -> usize {
    let applier = Applier::unowned(store);
    let ns = Some(namespace);
    let results = [
        (
            "Ingress",
            DEPRECATED_API_INGRESS,
            applier.remove::<Ingress>(ns, DEPRECATED_API_INGRESS).await,
        ),
        (
            "ConfigMap",
            DEPRECATED_CONFIGMAP,
            applier.remove::<ConfigMap>(ns, DEPRECATED_CONFIGMAP).await,
        ),
        (
            "Certificate",
            DEPRECATED_CERTIFICATE,
            applier.remove::<Certificate>(ns, DEPRECATED_CERTIFICATE).await,
        ),
        (
            "NavConfiguration",
            DEPRECATED_NAV_CONFIGURATION,
            applier
                .remove::<NavConfiguration>(ns, DEPRECATED_NAV_CONFIGURATION)
                .await,
        ),
    ];

    let mut removed = 0;
    for (kind, name, result) in results {
        match result {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                metrics::increment_cleanup_errors();
                warn!(kind, name, namespace, error = %e, "Failed to delete deprecated resource");
            }
        }
    }
    removed
}
