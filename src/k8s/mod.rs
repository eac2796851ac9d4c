// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes resource operations and convergence checks.

pub mod client;
pub mod deployments;
pub mod nodes;
pub mod storage;

pub use client::client_for;
pub use deployments::{validate_deployment, validate_deployment_terminated};
pub use nodes::validate_node;
pub use storage::validate_claim_bound;

use kube::ResourceExt;

/// Namespace of a resource, defaulting to "default" when unset.
pub(crate) fn namespace_of(resource: &impl ResourceExt) -> String {
    resource
        .namespace()
        .unwrap_or_else(|| "default".to_string())
}
