//! # Environment Facts
//!
//! Facts about the runtime environment, probed once per pass from well-known objects
//! in the instance namespace. A missing probe object is a valid outcome that yields
//! the "false/unknown" value of the fact; only store failures are errors.

use crate::constants::{
    ADMIN_HUB_CONFIGMAP_NAME, CERTIFICATE_SECRET_NAME, CLUSTER_ADDRESS_KEY,
    CLUSTER_INFO_CONFIGMAP_NAME, CLUSTER_NAME_KEY, CLUSTER_TYPE_KEY, DEFAULT_CLUSTER_NAME,
    PLATFORM_CONFIGMAP_NAME,
};
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use tracing::debug;

/// Platform distribution value marking a CNCF-conformant cluster
const CNCF_CLUSTER_TYPE: &str = "cncf";

/// Key of the CA bundle in the serving certificate secret
const CA_CERT_KEY: &str = "ca.crt";

/// Read-only inputs shared by every generator in a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFacts {
    /// The admin hub add-on is installed
    pub admin_hub_present: bool,
    /// Routes and console links are unavailable; ingresses are used instead
    pub cncf: bool,
    /// External host routes and ingresses are served on
    pub cluster_address: Option<String>,
    pub cluster_name: String,
    /// PEM CA of the serving certificate, once cert-manager has issued it
    pub serving_ca: Option<String>,
}

impl Default for EnvironmentFacts {
    fn default() -> Self {
        Self {
            admin_hub_present: false,
            cncf: false,
            cluster_address: None,
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            serving_ca: None,
        }
    }
}

impl EnvironmentFacts {
    /// Platform label reported to the console
    #[must_use]
    pub fn platform(&self) -> &'static str {
        if self.cncf {
            "cncf"
        } else {
            "openshift"
        }
    }
}

fn data_value(config_map: Option<&ConfigMap>, key: &str) -> Option<String> {
    config_map
        .and_then(|cm| cm.data.as_ref())
        .and_then(|data| data.get(key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Probe every fact in `namespace`
pub async fn probe<S: ObjectStore>(
    store: &S,
    namespace: &str,
) -> Result<EnvironmentFacts, StoreError> {
    let ns = Some(namespace);

    let admin_hub_present = store
        .get_opt::<ConfigMap>(ns, ADMIN_HUB_CONFIGMAP_NAME)
        .await?
        .is_some();

    let platform = store
        .get_opt::<ConfigMap>(ns, PLATFORM_CONFIGMAP_NAME)
        .await?;
    let cncf = data_value(platform.as_ref(), CLUSTER_TYPE_KEY)
        .is_some_and(|t| t.eq_ignore_ascii_case(CNCF_CLUSTER_TYPE));

    let cluster_info = store
        .get_opt::<ConfigMap>(ns, CLUSTER_INFO_CONFIGMAP_NAME)
        .await?;
    let cluster_address = data_value(cluster_info.as_ref(), CLUSTER_ADDRESS_KEY);
    let cluster_name = data_value(cluster_info.as_ref(), CLUSTER_NAME_KEY)
        .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());

    let serving_ca = store
        .get_opt::<Secret>(ns, CERTIFICATE_SECRET_NAME)
        .await?
        .and_then(|secret| secret.data)
        .and_then(|mut data| data.remove(CA_CERT_KEY))
        .and_then(|bytes| String::from_utf8(bytes.0).ok())
        .filter(|pem| !pem.trim().is_empty());

    let facts = EnvironmentFacts {
        admin_hub_present,
        cncf,
        cluster_address,
        cluster_name,
        serving_ca,
    };
    debug!(
        admin_hub = facts.admin_hub_present,
        platform = facts.platform(),
        cluster_address = facts.cluster_address.as_deref().unwrap_or("unknown"),
        serving_ca = facts.serving_ca.is_some(),
        "environment probed"
    );
    Ok(facts)
}
