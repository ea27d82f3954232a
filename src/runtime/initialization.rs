//! # Initialization
//!
//! Process bootstrap: rustls provider, tracing, metrics, the HTTP server, the
//! Kubernetes client and discovery of the optional CRDs the operator manages.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::{Certificate, NavConfiguration, Route};
use crate::observability;
use crate::runtime::watch_loop::InstalledKinds;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub installed: InstalledKinds,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL`.
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("console_ui_operator={}", config.log_level).into());
    let result = if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

/// Initialize the operator runtime
///
/// # Errors
///
/// Metric registration, HTTP server startup or Kubernetes client creation failures.
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env();
    init_tracing(&config);

    info!("Starting Console UI Operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let installed = discover_installed_kinds(&client).await;
    info!(
        routes = installed.routes,
        certificates = installed.certificates,
        nav_configurations = installed.nav_configurations,
        "Discovered optional kinds"
    );

    let store = KubeStore::new(client.clone(), config.store_call_timeout());
    let reconciler = Arc::new(Reconciler::new(store, config));

    info!("Operator initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        installed,
    })
}

/// Wait until the HTTP server has bound its listener
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn queryable<K>(client: &Client) -> bool
where
    K: kube::Resource<DynamicType = ()> + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match Api::<K>::all(client.clone())
        .list(&ListParams::default().limit(1))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(kind = %K::kind(&()), error = %e, "Kind not queryable, not watching it");
            false
        }
    }
}

/// Which optional CRDs the cluster serves
async fn discover_installed_kinds(client: &Client) -> InstalledKinds {
    InstalledKinds {
        routes: queryable::<Route>(client).await,
        certificates: queryable::<Certificate>(client).await,
        nav_configurations: queryable::<NavConfiguration>(client).await,
    }
}
