// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Well-known Kubernetes label and annotation keys
pub mod labels {
    /// Present on control-plane nodes
    pub const NODE_ROLE_MASTER: &str = "node-role.kubernetes.io/master";
    /// Legacy storage-class annotation on persistent volume claims
    pub const PVC_STORAGE_CLASS: &str = "volume.beta.kubernetes.io/storage-class";
}

/// Convergence deadlines and poll intervals per resource class
pub mod convergence {
    use std::time::Duration;

    /// Deadline for a deployment to reach its desired replica count
    pub const DEPLOYMENT_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
    /// Poll interval while waiting for deployment readiness
    pub const DEPLOYMENT_READY_INTERVAL: Duration = Duration::from_secs(10);
    /// Deadline for a deleted deployment's pods to disappear
    pub const DEPLOYMENT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10 * 60);
    /// Poll interval while waiting for deployment teardown
    pub const DEPLOYMENT_TEARDOWN_INTERVAL: Duration = Duration::from_secs(10);
    /// Deadline for a persistent volume claim to bind
    pub const CLAIM_BOUND_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    /// Poll interval while waiting for claim binding
    pub const CLAIM_BOUND_INTERVAL: Duration = Duration::from_secs(10);
}

/// Write attempts for optimistic-concurrency node label updates
pub const LABEL_UPDATE_MAX_RETRIES: u32 = 5;
