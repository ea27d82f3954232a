//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Field manager / component name reported on writes and events
pub const OPERATOR_NAME: &str = "console-ui-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default deadline applied to every call against the Kubernetes API (seconds)
pub const DEFAULT_STORE_CALL_TIMEOUT_SECS: u64 = 30;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default delay before the follow-up pass after a pass created objects (seconds)
pub const DEFAULT_REQUEUE_AFTER_CHANGE_SECS: u64 = 5;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default number of instances reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 4;

// Managed object names

/// Name shared by the workload, service, service account, role and role binding
pub const APP_NAME: &str = "console-ui";

/// Log configuration ConfigMap mounted into the workload
pub const LOG4JS_CONFIGMAP_NAME: &str = "console-ui-log4js";

/// cert-manager Certificate serving the workload
pub const CERTIFICATE_NAME: &str = "console-ui-ca-cert";

/// Secret produced by the Certificate
pub const CERTIFICATE_SECRET_NAME: &str = "console-ui-cert";

/// Issuer referenced by the Certificate
pub const CERTIFICATE_ISSUER_NAME: &str = "platform-ca-issuer";

/// Route / Ingress serving the UI path
pub const ROUTE_NAME: &str = "console-ui";

/// Route / Ingress serving the OIDC callback path
pub const CALLBACK_ROUTE_NAME: &str = "console-ui-callback";

/// Path served by the callback route
pub const CALLBACK_PATH: &str = "/oidc/callback";

/// NavConfiguration describing console navigation
pub const NAV_CONFIG_NAME: &str = "console-ui-nav";

/// Prefix of the cluster-scoped ConsoleLink (suffixed with the instance namespace)
pub const CONSOLE_LINK_PREFIX: &str = "console-ui";

/// Route owned by the platform identity stack, source of the console host
pub const PLATFORM_CONSOLE_ROUTE_NAME: &str = "cp-console";

/// Secret holding the OIDC client registration used by the workload
pub const OIDC_CREDENTIALS_SECRET_NAME: &str = "platform-oidc-credentials";

/// Container port served by the workload
pub const APP_PORT: i32 = 3000;

// Environment probes

/// ConfigMap whose presence signals the admin hub add-on
pub const ADMIN_HUB_CONFIGMAP_NAME: &str = "admin-hub-config";

/// ConfigMap describing the platform distribution
pub const PLATFORM_CONFIGMAP_NAME: &str = "platform-config";

/// Key in the platform ConfigMap holding the distribution type
pub const CLUSTER_TYPE_KEY: &str = "kubernetes_cluster_type";

/// ConfigMap describing cluster addressing
pub const CLUSTER_INFO_CONFIGMAP_NAME: &str = "platform-cluster-info";

/// Key in the cluster info ConfigMap holding the external console host
pub const CLUSTER_ADDRESS_KEY: &str = "cluster_address";

/// Key in the cluster info ConfigMap holding the cluster name
pub const CLUSTER_NAME_KEY: &str = "cluster_name";

/// Cluster name used when the cluster info ConfigMap does not set one
pub const DEFAULT_CLUSTER_NAME: &str = "mycluster";

// Labels, annotations and finalizers written by other actors or by this operator

/// Rotation marker written by the certificate rotation component
pub const TIME_RESTARTED_LABEL: &str = "certmanager.k8s.io/time-restarted";

/// Namespace list written by the namespace-scope component
pub const NAMESPACE_SCOPE_ANNOTATION: &str = "nss.octopilot.io/namespaceList";

/// Pod selector label
pub const SELECTOR_LABEL: &str = "k8s-app";

/// Finalizer guarding the ConsoleLink
pub const CONSOLE_LINK_FINALIZER: &str = "console-ui.octopilot.io/consolelink";

/// Finalizer written by earlier releases for the same ConsoleLink
pub const DEPRECATED_CONSOLE_LINK_FINALIZER: &str = "consolelink.octopilot.io/finalizer";

// Specification defaults

/// Image registry used when `consoleConfig.imageRegistry` is unset
pub const DEFAULT_IMAGE_REGISTRY: &str = "quay.io/octopilot";

/// Image repository used when `consoleConfig.imageName` is unset
pub const DEFAULT_IMAGE_NAME: &str = "console-ui";

/// Image tag shipped with this operator release
pub const DEFAULT_IMAGE_TAG: &str = "4.2.0";

/// Path the console is served under
pub const DEFAULT_INGRESS_PATH: &str = "/common-nav";

/// log4js level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Landing page when the admin hub add-on is installed and none is configured
pub const ADMIN_HUB_LANDING_PAGE: &str = "/admin-hub/dashboard";

pub const DEFAULT_IDENTITY_PROVIDER_URL: &str = "https://platform-identity-provider:4300";
pub const DEFAULT_AUTH_SERVICE_URL: &str = "https://platform-auth-service:9443";
pub const DEFAULT_ROUTER_URL: &str = "https://cp-console:443";
pub const DEFAULT_CLOUD_PAK_VERSION: &str = "4.0";
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Session polling interval (milliseconds)
pub const DEFAULT_SESSION_POLLING_INTERVAL: u32 = 5000;

pub const DEFAULT_REPLICAS: i32 = 1;
pub const DEFAULT_MAX_REPLICAS: i32 = 3;

pub const DEFAULT_REQUEST_CPU: &str = "300m";
pub const DEFAULT_REQUEST_MEMORY: &str = "512Mi";
pub const DEFAULT_REQUEST_EPHEMERAL_STORAGE: &str = "256Mi";
pub const DEFAULT_LIMIT_CPU: &str = "1000m";
pub const DEFAULT_LIMIT_MEMORY: &str = "1Gi";
pub const DEFAULT_LIMIT_EPHEMERAL_STORAGE: &str = "512Mi";

/// Lower bound of the reconciliation error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;

/// Upper bound of the reconciliation error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Maximum time to wait for the HTTP server to bind at startup (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the HTTP server to bind (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
