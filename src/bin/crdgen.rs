//! # CRD Generator
//!
//! Prints the `ConsoleUI` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/consoleui.yaml
//! cargo run --bin crdgen -- --output config/crd/consoleui.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use console_ui_operator::crd::ConsoleUI;
use kube::core::CustomResourceExt;
use std::path::PathBuf;

/// Generate the ConsoleUI CRD manifest
#[derive(Parser, Debug)]
#[command(name = "crdgen", version, about)]
struct Args {
    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let yaml =
        serde_yaml::to_string(&ConsoleUI::crd()).context("Failed to serialize CRD to YAML")?;

    match args.output {
        Some(path) => std::fs::write(&path, yaml)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}
