// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Harness configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Scheduler name used to resolve the storage driver
    pub scheduler: String,
    /// Kubeconfig path; the in-cluster/inferred config is used when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables. When SHEPHERD_CONFIG
    /// points to a YAML file, that file supplies the whole configuration.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = env::var("SHEPHERD_CONFIG") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            return Self::from_yaml(&raw);
        }

        let scheduler = env::var("SHEPHERD_SCHEDULER")
            .context("SHEPHERD_SCHEDULER environment variable not set")?;
        let kubeconfig = env::var("SHEPHERD_KUBECONFIG").ok().map(PathBuf::from);

        Ok(Config {
            scheduler,
            kubeconfig,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("failed to parse config file")
    }
}
