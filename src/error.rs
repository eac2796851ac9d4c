// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use thiserror::Error;

use crate::retry::{Attempt, RetryError};

#[derive(Error, Debug)]
pub enum ShepherdError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("deployment {id} is not ready: {cause}")]
    DeploymentNotReady { id: String, cause: String },

    #[error("deployment {id} is not terminated: {cause}")]
    DeploymentNotTerminated { id: String, cause: String },

    #[error("persistent volume claim {id} is not bound: {cause}")]
    ClaimNotBound { id: String, cause: String },

    #[error("node {node} is not ready as condition {condition} ({message}) is {status}. Reason: {reason}")]
    NodeNotReady {
        node: String,
        condition: String,
        status: String,
        message: String,
        reason: String,
    },

    #[error("timed out after {elapsed:?}: {source}")]
    Timeout {
        elapsed: Duration,
        source: Box<ShepherdError>,
    },

    #[error("{kind} not found: {name}")]
    NotRegistered { name: String, kind: &'static str },

    #[error("persistent volume claim {0} has no storage request")]
    MissingStorageRequest(String),

    #[error("persistent volume claim {0} has no storage class")]
    MissingStorageClass(String),

    #[error("invalid resource quantity {0:?}")]
    InvalidQuantity(String),
}

pub type Result<T> = std::result::Result<T, ShepherdError>;

impl From<RetryError<ShepherdError>> for ShepherdError {
    fn from(err: RetryError<ShepherdError>) -> Self {
        match err {
            RetryError::Timeout { elapsed, last } => ShepherdError::Timeout {
                elapsed,
                source: Box::new(last),
            },
            RetryError::Fatal(err) => err,
        }
    }
}

// Lets convergence predicates use `?` on API calls; an API failure is retried
// until the deadline.
impl From<kube::Error> for Attempt<ShepherdError> {
    fn from(err: kube::Error) -> Self {
        Attempt::Retry(ShepherdError::Kube(err))
    }
}
