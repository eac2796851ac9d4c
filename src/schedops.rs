// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scheduler-specific storage service operations behind a runtime registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Result, ShepherdError};

/// Category tag carried by registry not-found errors
const DRIVER_KIND: &str = "scheduler storage driver";

/// Operations a scheduler backend must provide for the storage service on a
/// single node. Retry behavior, if any, belongs to the implementation.
#[async_trait]
pub trait StorageOps: Send + Sync {
    /// Disable the storage service on the given node
    async fn disable_on_node(&self, node: &str) -> Result<()>;

    /// Enable the storage service on the given node
    async fn enable_on_node(&self, node: &str) -> Result<()>;

    /// Validate the storage service state on the given node
    async fn validate_on_node(&self, node: &str) -> Result<()>;
}

/// Name-keyed registry of scheduler storage drivers.
///
/// Registration happens during startup through `&mut self`; resolution is
/// read-only. Callers that must register after handing out shared references
/// need their own lock around the registry.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn StorageOps>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under the given scheduler name. A later registration
    /// for the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn StorageOps>) {
        let name = name.into();
        info!("Registering {DRIVER_KIND}: {name}");
        self.drivers.insert(name, driver);
    }

    /// The driver registered under the given scheduler name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn StorageOps>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| ShepherdError::NotRegistered {
                name: name.to_string(),
                kind: DRIVER_KIND,
            })
    }
}
