// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client construction

use crate::config::Config;
use crate::error::{Result, ShepherdError};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use tracing::{debug, info};

/// Create a client for the cluster selected by the configuration
pub async fn client_for(config: &Config) -> Result<Client> {
    match &config.kubeconfig {
        Some(path) => client_from_kubeconfig(path).await,
        None => default_client().await,
    }
}

/// Create a client from the in-cluster service account or local inferred config
pub async fn default_client() -> Result<Client> {
    debug!("Creating Kubernetes client from inferred config");
    Ok(Client::try_default().await?)
}

/// Create a Kubernetes client from a kubeconfig file
pub async fn client_from_kubeconfig(path: &Path) -> Result<Client> {
    info!(
        "Creating Kubernetes client from kubeconfig {}",
        path.display()
    );

    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ShepherdError::Kubeconfig(format!("failed to read {}: {}", path.display(), e))
    })?;

    let kubeconfig: Kubeconfig = serde_yaml::from_str(&raw).map_err(|e| {
        ShepherdError::Kubeconfig(format!("failed to parse {}: {}", path.display(), e))
    })?;

    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                ShepherdError::Kubeconfig(format!("failed to build client config: {}", e))
            })?;

    Client::try_from(client_config)
        .map_err(|e| ShepherdError::Kubeconfig(format!("failed to create client: {}", e)))
}
