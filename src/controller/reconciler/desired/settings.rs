//! # Resolved Settings
//!
//! Applies every documented default to a `ConsoleUISpec` once, so generators read
//! plain values instead of re-deriving defaults per field.

use crate::constants::{
    ADMIN_HUB_LANDING_PAGE, APP_NAME, DEFAULT_ADMIN_USER, DEFAULT_AUTH_SERVICE_URL,
    DEFAULT_CLOUD_PAK_VERSION, DEFAULT_IDENTITY_PROVIDER_URL, DEFAULT_IMAGE_NAME,
    DEFAULT_IMAGE_REGISTRY, DEFAULT_IMAGE_TAG, DEFAULT_INGRESS_PATH, DEFAULT_LIMIT_CPU,
    DEFAULT_LIMIT_EPHEMERAL_STORAGE, DEFAULT_LIMIT_MEMORY, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_REPLICAS, DEFAULT_REPLICAS, DEFAULT_REQUEST_CPU,
    DEFAULT_REQUEST_EPHEMERAL_STORAGE, DEFAULT_REQUEST_MEMORY, DEFAULT_ROUTER_URL,
    DEFAULT_SESSION_POLLING_INTERVAL,
};
use crate::controller::reconciler::compare::ParsedQuantity;
use crate::controller::reconciler::environment::EnvironmentFacts;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{AuthConfig, ConsoleUISpec, ResourceValues};

/// Treat empty and whitespace-only strings as unset
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn or_default(value: Option<&String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}

/// One side of the container sizing with every quantity present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantities {
    pub cpu: String,
    pub memory: String,
    pub ephemeral_storage: String,
}

/// Requests and limits of the console container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sizing {
    pub requests: Quantities,
    pub limits: Quantities,
}

/// Legacy sizing string: a bare number carries an implied unit
fn legacy_quantity(value: &str, unit: &str) -> String {
    if value.chars().all(|c| c.is_ascii_digit()) {
        format!("{value}{unit}")
    } else {
        value.to_string()
    }
}

fn validated(field: &str, value: String) -> Result<String, ReconcilerError> {
    ParsedQuantity::parse(&value)
        .map(|_| value.clone())
        .map_err(|e| ReconcilerError::invalid("ConsoleUI", format!("{field} '{value}': {e}")))
}

struct SizingSource<'a> {
    explicit: Option<&'a ResourceValues>,
    legacy_cpu: Option<&'a String>,
    legacy_memory: Option<&'a String>,
}

impl SizingSource<'_> {
    fn resolve(
        &self,
        side: &str,
        defaults: (&str, &str, &str),
    ) -> Result<Quantities, ReconcilerError> {
        let cpu = non_empty(self.explicit.and_then(|v| v.cpu.as_ref()))
            .map(str::to_string)
            .or_else(|| non_empty(self.legacy_cpu).map(|v| legacy_quantity(v, "m")))
            .unwrap_or_else(|| defaults.0.to_string());
        let memory = non_empty(self.explicit.and_then(|v| v.memory.as_ref()))
            .map(str::to_string)
            .or_else(|| non_empty(self.legacy_memory).map(|v| legacy_quantity(v, "Mi")))
            .unwrap_or_else(|| defaults.1.to_string());
        let ephemeral_storage =
            or_default(self.explicit.and_then(|v| v.ephemeral_storage.as_ref()), defaults.2);

        Ok(Quantities {
            cpu: validated(&format!("resources.{side}.cpu"), cpu)?,
            memory: validated(&format!("resources.{side}.memory"), memory)?,
            ephemeral_storage: validated(
                &format!("resources.{side}.ephemeral-storage"),
                ephemeral_storage,
            )?,
        })
    }
}

/// Legacy `consoleConfig` strings apply only without `resources`
fn legacy(use_legacy: bool, value: &Option<String>) -> Option<&String> {
    if use_legacy {
        value.as_ref()
    } else {
        None
    }
}

/// Resolve sizing: `resources`, then the legacy `consoleConfig` strings (only when
/// `resources` is unset), then the defaults
fn resolve_sizing(spec: &ConsoleUISpec) -> Result<Sizing, ReconcilerError> {
    let config = &spec.console_config;
    let use_legacy = spec.resources.is_none();

    let requests = SizingSource {
        explicit: spec.resources.as_ref().and_then(|r| r.requests.as_ref()),
        legacy_cpu: legacy(use_legacy, &config.request_limits),
        legacy_memory: legacy(use_legacy, &config.request_memory),
    }
    .resolve(
        "requests",
        (
            DEFAULT_REQUEST_CPU,
            DEFAULT_REQUEST_MEMORY,
            DEFAULT_REQUEST_EPHEMERAL_STORAGE,
        ),
    )?;
    let limits = SizingSource {
        explicit: spec.resources.as_ref().and_then(|r| r.limits.as_ref()),
        legacy_cpu: legacy(use_legacy, &config.cpu_limits),
        legacy_memory: legacy(use_legacy, &config.cpu_memory),
    }
    .resolve(
        "limits",
        (
            DEFAULT_LIMIT_CPU,
            DEFAULT_LIMIT_MEMORY,
            DEFAULT_LIMIT_EPHEMERAL_STORAGE,
        ),
    )?;

    Ok(Sizing { requests, limits })
}

/// Every spec value with its default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub service_name: String,
    pub image: String,
    pub ingress_path: String,
    /// Empty means the console picks its own landing page
    pub landing_page: String,
    pub log_level: String,
    pub pull_secret: Option<String>,
    pub identity_provider_url: String,
    pub auth_service_url: String,
    pub router_url: String,
    pub cloud_pak_version: String,
    pub default_admin_user: String,
    pub session_polling_interval: u32,
    pub auth: AuthSettings,
    pub send_analytics: bool,
    /// Replica count for a freshly created workload, never below 1
    pub replicas: i32,
    pub scaling_enabled: bool,
    pub max_replicas: i32,
    pub sizing: Sizing,
    pub metrics_collection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub default_auth: bool,
    pub enterprise_ldap: bool,
    pub enterprise_saml: bool,
    pub os_auth: bool,
}

impl From<&AuthConfig> for AuthSettings {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            default_auth: auth.default_auth,
            enterprise_ldap: auth.enterprise_ldap,
            enterprise_saml: auth.enterprise_saml,
            os_auth: auth.os_auth,
        }
    }
}

impl ResolvedSettings {
    /// Resolve `spec` against the environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidObject` when a sizing value is not a valid quantity.
    pub fn resolve(spec: &ConsoleUISpec, facts: &EnvironmentFacts) -> Result<Self, ReconcilerError> {
        let console = &spec.console_config;
        let global = &spec.global_config;

        let image = format!(
            "{}/{}:{}",
            or_default(console.image_registry.as_ref(), DEFAULT_IMAGE_REGISTRY).trim_end_matches('/'),
            or_default(console.image_name.as_ref(), DEFAULT_IMAGE_NAME),
            or_default(console.image_tag.as_ref(), DEFAULT_IMAGE_TAG),
        );

        let landing_page = match non_empty(console.landing_page.as_ref()) {
            Some(page) => page.to_string(),
            None if facts.admin_hub_present => ADMIN_HUB_LANDING_PAGE.to_string(),
            None => String::new(),
        };

        let replicas = spec.replicas.unwrap_or(DEFAULT_REPLICAS).max(1);
        let max_replicas = spec
            .scaling
            .max_replicas
            .unwrap_or(DEFAULT_MAX_REPLICAS)
            .max(replicas);

        Ok(Self {
            service_name: or_default(console.service_name.as_ref(), APP_NAME),
            image,
            ingress_path: or_default(console.ingress_path.as_ref(), DEFAULT_INGRESS_PATH),
            landing_page,
            log_level: or_default(console.log_level.as_ref(), DEFAULT_LOG_LEVEL),
            pull_secret: non_empty(global.pull_secret.as_ref()).map(str::to_string),
            identity_provider_url: or_default(
                global.identity_provider_url.as_ref(),
                DEFAULT_IDENTITY_PROVIDER_URL,
            ),
            auth_service_url: or_default(global.auth_service_url.as_ref(), DEFAULT_AUTH_SERVICE_URL),
            router_url: or_default(global.router_url.as_ref(), DEFAULT_ROUTER_URL),
            cloud_pak_version: or_default(
                global.cloud_pak_version.as_ref(),
                DEFAULT_CLOUD_PAK_VERSION,
            ),
            default_admin_user: or_default(global.default_admin_user.as_ref(), DEFAULT_ADMIN_USER),
            session_polling_interval: global
                .session_polling_interval
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_SESSION_POLLING_INTERVAL),
            auth: AuthSettings::from(&global.auth),
            send_analytics: global.send_analytics,
            replicas,
            scaling_enabled: spec.scaling.enabled,
            max_replicas,
            sizing: resolve_sizing(spec)?,
            metrics_collection: spec.enable_metrics_collection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ResourceSettings;

    fn resolve(spec: &ConsoleUISpec) -> ResolvedSettings {
        ResolvedSettings::resolve(spec, &EnvironmentFacts::default()).unwrap()
    }

    #[test]
    fn test_empty_spec_resolves_to_defaults() {
        let settings = resolve(&ConsoleUISpec::default());
        assert_eq!(settings.service_name, "console-ui");
        assert_eq!(settings.image, "quay.io/octopilot/console-ui:4.2.0");
        assert_eq!(settings.ingress_path, "/common-nav");
        assert_eq!(settings.landing_page, "");
        assert_eq!(settings.replicas, 1);
        assert_eq!(settings.max_replicas, 3);
        assert_eq!(settings.session_polling_interval, 5000);
        assert!(settings.auth.default_auth);
        assert_eq!(settings.sizing.requests.memory, "512Mi");
        assert_eq!(settings.sizing.limits.cpu, "1000m");
    }

    #[test]
    fn test_zero_replicas_clamped_and_blank_memory_defaulted() {
        let spec = ConsoleUISpec {
            replicas: Some(0),
            resources: Some(ResourceSettings {
                requests: Some(ResourceValues {
                    memory: Some(String::new()),
                    ..Default::default()
                }),
                limits: None,
            }),
            ..Default::default()
        };
        let settings = resolve(&spec);
        assert_eq!(settings.replicas, 1);
        assert_eq!(settings.sizing.requests.memory, "512Mi");
        assert_eq!(settings.sizing.requests.cpu, "300m");
    }

    #[test]
    fn test_legacy_sizing_used_only_without_resources() {
        let mut spec = ConsoleUISpec::default();
        spec.console_config.cpu_limits = Some("800".to_string());
        spec.console_config.request_memory = Some("256".to_string());
        let settings = resolve(&spec);
        assert_eq!(settings.sizing.limits.cpu, "800m");
        assert_eq!(settings.sizing.requests.memory, "256Mi");

        spec.resources = Some(ResourceSettings::default());
        let settings = resolve(&spec);
        assert_eq!(settings.sizing.limits.cpu, "1000m");
        assert_eq!(settings.sizing.requests.memory, "512Mi");
    }

    #[test]
    fn test_overflowing_legacy_quantity_is_rejected() {
        let mut spec = ConsoleUISpec::default();
        spec.console_config.cpu_limits = Some("1e2147483647".to_string());
        let err = ResolvedSettings::resolve(&spec, &EnvironmentFacts::default()).unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidObject { .. }));
    }

    #[test]
    fn test_invalid_quantity_is_rejected() {
        let spec = ConsoleUISpec {
            resources: Some(ResourceSettings {
                requests: None,
                limits: Some(ResourceValues {
                    cpu: Some("lots".to_string()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };
        let err = ResolvedSettings::resolve(&spec, &EnvironmentFacts::default()).unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidObject { .. }));
        assert!(err.to_string().contains("resources.limits.cpu"));
    }

    #[test]
    fn test_admin_hub_sets_landing_page_unless_configured() {
        let facts = EnvironmentFacts {
            admin_hub_present: true,
            ..Default::default()
        };
        let mut spec = ConsoleUISpec::default();
        let settings = ResolvedSettings::resolve(&spec, &facts).unwrap();
        assert_eq!(settings.landing_page, ADMIN_HUB_LANDING_PAGE);

        spec.console_config.landing_page = Some("/welcome".to_string());
        let settings = ResolvedSettings::resolve(&spec, &facts).unwrap();
        assert_eq!(settings.landing_page, "/welcome");
    }

    #[test]
    fn test_max_replicas_never_below_replicas() {
        let mut spec = ConsoleUISpec {
            replicas: Some(5),
            ..Default::default()
        };
        spec.scaling.max_replicas = Some(2);
        assert_eq!(resolve(&spec).max_replicas, 5);
    }
}
