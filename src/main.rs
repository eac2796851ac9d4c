// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::ResourceExt;
use tracing::{error, info, warn};

use shepherd::config::Config;
use shepherd::k8s::client::client_for;
use shepherd::k8s::nodes::{check_node_conditions, is_master, list_nodes};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting cluster preflight");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: scheduler={}", config.scheduler);

    // Create Kubernetes client
    let client = client_for(&config).await?;
    info!("Connected to Kubernetes cluster");

    let nodes = list_nodes(&client).await?;
    info!("Found {} nodes", nodes.len());

    let mut failures = 0;
    for node in &nodes {
        if is_master(node) {
            info!("Skipping master node {}", node.name_any());
            continue;
        }

        match check_node_conditions(node) {
            Ok(()) => info!("Node {} is ready", node.name_any()),
            Err(err) => {
                warn!("{err}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        error!("{failures} nodes failed preflight");
        std::process::exit(1);
    }

    info!("All worker nodes ready");
    Ok(())
}
