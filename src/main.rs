//! # Console UI Operator
//!
//! Kubernetes operator that converges the platform console UI from `ConsoleUI`
//! resources: workload, service, routes or ingresses, certificate, access control,
//! autoscaling, navigation and the cluster console link.
//!
//! Configuration comes from environment variables (see `ControllerConfig`).

use anyhow::Result;
use console_ui_operator::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.installed,
    )
    .await;
    Ok(())
}
