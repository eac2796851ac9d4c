// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Node inspection and label mutation.

use k8s_openapi::api::core::v1::Node;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{instrument, warn};

use crate::constants::{labels, LABEL_UPDATE_MAX_RETRIES};
use crate::error::{Result, ShepherdError};

/// Node condition that must report `True` on a healthy node
const READY_CONDITION: &str = "Ready";

/// Node conditions that must report `False` when present
const PRESSURE_CONDITIONS: [&str; 5] = [
    "OutOfDisk",
    "MemoryPressure",
    "DiskPressure",
    "NetworkUnavailable",
    "InodePressure",
];

/// All nodes in the cluster
pub async fn list_nodes(client: &Client) -> Result<Vec<Node>> {
    let api: Api<Node> = Api::all(client.clone());
    Ok(api.list(&ListParams::default()).await?.items)
}

/// The node with the given name
pub async fn get_node(client: &Client, name: &str) -> Result<Node> {
    let api: Api<Node> = Api::all(client.clone());
    Ok(api.get(name).await?)
}

/// Single-shot node readiness check: fetches the node and inspects its
/// condition list. Not retried; callers decide whether to poll.
#[instrument(skip(client))]
pub async fn validate_node(client: &Client, name: &str) -> Result<()> {
    let node = get_node(client, name).await?;
    check_node_conditions(&node)
}

/// `Ready` must be `True` and every pressure condition `False`. A condition
/// absent from the list is no opinion, not a violation.
pub fn check_node_conditions(node: &Node) -> Result<()> {
    let name = node.name_any();
    let conditions = node.status.as_ref().and_then(|s| s.conditions.as_ref());

    for condition in conditions.into_iter().flatten() {
        let healthy = if condition.type_ == READY_CONDITION {
            condition.status == "True"
        } else if PRESSURE_CONDITIONS.contains(&condition.type_.as_str()) {
            condition.status == "False"
        } else {
            continue;
        };

        if !healthy {
            return Err(ShepherdError::NodeNotReady {
                node: name,
                condition: condition.type_.clone(),
                status: condition.status.clone(),
                message: condition.message.clone().unwrap_or_default(),
                reason: condition.reason.clone().unwrap_or_default(),
            });
        }
    }

    Ok(())
}

/// Whether the node carries the control-plane master role label
pub fn is_master(node: &Node) -> bool {
    node.labels().contains_key(labels::NODE_ROLE_MASTER)
}

/// Add a label to the node, re-reading it before every write so a conflicting
/// concurrent update is retried against fresh state. Adding a label that is
/// already present with the same value succeeds without writing.
#[instrument(skip(client))]
pub async fn add_node_label(client: &Client, name: &str, key: &str, value: &str) -> Result<()> {
    let api: Api<Node> = Api::all(client.clone());
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut node = api.get(name).await?;

        let label_map = node.metadata.labels.get_or_insert_with(Default::default);
        if label_map.get(key).is_some_and(|v| v == value) {
            return Ok(());
        }
        label_map.insert(key.to_string(), value.to_string());

        match api.replace(name, &PostParams::default(), &node).await {
            Ok(_) => return Ok(()),
            Err(err) if attempt < LABEL_UPDATE_MAX_RETRIES => {
                warn!("Failed to update labels on node {name}, retrying: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Remove a label from the node, with the same re-read-then-write retry as
/// `add_node_label`. Removing an absent label succeeds without writing.
#[instrument(skip(client))]
pub async fn remove_node_label(client: &Client, name: &str, key: &str) -> Result<()> {
    let api: Api<Node> = Api::all(client.clone());
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut node = api.get(name).await?;

        let removed = node
            .metadata
            .labels
            .as_mut()
            .and_then(|labels| labels.remove(key));
        if removed.is_none() {
            return Ok(());
        }

        match api.replace(name, &PostParams::default(), &node).await {
            Ok(_) => return Ok(()),
            Err(err) if attempt < LABEL_UPDATE_MAX_RETRIES => {
                warn!("Failed to update labels on node {name}, retrying: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
}
