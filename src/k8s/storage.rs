// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Storage class and persistent volume claim operations.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::instrument;

use crate::constants::{convergence, labels};
use crate::error::{Result, ShepherdError};
use crate::k8s::namespace_of;
use crate::retry::{run_until, Attempt, RetryPolicy};

/// Phase a claim reports once it is attached to backing storage
pub const CLAIM_BOUND_PHASE: &str = "Bound";

const GIB: i64 = 1024 * 1024 * 1024;

/// Create the given storage class
pub async fn create_storage_class(client: &Client, class: &StorageClass) -> Result<StorageClass> {
    let api: Api<StorageClass> = Api::all(client.clone());
    Ok(api.create(&PostParams::default(), class).await?)
}

/// Delete the given storage class
pub async fn delete_storage_class(client: &Client, class: &StorageClass) -> Result<()> {
    let api: Api<StorageClass> = Api::all(client.clone());
    api.delete(&class.name_any(), &DeleteParams::default())
        .await?;
    Ok(())
}

/// Validate that the given storage class exists
pub async fn validate_storage_class(client: &Client, class: &StorageClass) -> Result<()> {
    let api: Api<StorageClass> = Api::all(client.clone());
    api.get(&class.name_any()).await?;
    Ok(())
}

/// Create the given persistent volume claim
pub async fn create_claim(
    client: &Client,
    claim: &PersistentVolumeClaim,
) -> Result<PersistentVolumeClaim> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace_of(claim));
    Ok(api.create(&PostParams::default(), claim).await?)
}

/// Delete the given persistent volume claim
pub async fn delete_claim(client: &Client, claim: &PersistentVolumeClaim) -> Result<()> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace_of(claim));
    api.delete(&claim.name_any(), &DeleteParams::default())
        .await?;
    Ok(())
}

/// Wait until the claim reports the bound phase. Every other phase, terminal
/// looking or not, is treated as not yet bound.
#[instrument(skip(client, claim), fields(claim = %claim.name_any()))]
pub async fn validate_claim_bound(client: &Client, claim: &PersistentVolumeClaim) -> Result<()> {
    let policy = RetryPolicy::fixed(
        convergence::CLAIM_BOUND_TIMEOUT,
        convergence::CLAIM_BOUND_INTERVAL,
    );
    validate_claim_bound_with(client, claim, &policy).await
}

/// `validate_claim_bound` with an explicit retry policy
pub async fn validate_claim_bound_with(
    client: &Client,
    claim: &PersistentVolumeClaim,
    policy: &RetryPolicy,
) -> Result<()> {
    let name = claim.name_any();
    let namespace = namespace_of(claim);

    run_until(policy, || claim_bound(client, &name, &namespace))
        .await
        .map_err(ShepherdError::from)
}

async fn claim_bound(
    client: &Client,
    name: &str,
    namespace: &str,
) -> std::result::Result<(), Attempt<ShepherdError>> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    let claim = api.get(name).await?;

    let phase = claim
        .status
        .and_then(|s| s.phase)
        .unwrap_or_default();

    if phase == CLAIM_BOUND_PHASE {
        return Ok(());
    }

    Err(Attempt::Retry(ShepherdError::ClaimNotBound {
        id: name.to_string(),
        cause: format!("expected phase: {CLAIM_BOUND_PHASE}, actual phase: {phase}"),
    }))
}

/// Name of the volume backing the given claim, empty while unbound
pub async fn claim_volume_name(client: &Client, claim: &PersistentVolumeClaim) -> Result<String> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace_of(claim));
    let claim = api.get(&claim.name_any()).await?;

    Ok(claim
        .spec
        .and_then(|s| s.volume_name)
        .unwrap_or_default())
}

/// Parameters a storage driver needs to provision the claim's volume: the
/// requested size rounded up to whole GiB (rendered in bytes under `size`)
/// merged with the claim's storage class parameters.
#[instrument(skip(client, claim), fields(claim = %claim.name_any()))]
pub async fn claim_params(
    client: &Client,
    claim: &PersistentVolumeClaim,
) -> Result<BTreeMap<String, String>> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace_of(claim));
    let claim = api.get(&claim.name_any()).await?;
    let name = claim.name_any();

    let requested = claim
        .spec
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .ok_or_else(|| ShepherdError::MissingStorageRequest(name.clone()))?;

    let request_gib = round_up(parse_quantity(&requested.0)?, GIB);

    let mut params = BTreeMap::new();
    params.insert("size".to_string(), (request_gib * GIB).to_string());

    let class_name =
        storage_class_of(&claim).ok_or_else(|| ShepherdError::MissingStorageClass(name))?;

    let classes: Api<StorageClass> = Api::all(client.clone());
    let class = classes.get(&class_name).await?;
    if let Some(parameters) = class.parameters {
        params.extend(parameters);
    }

    Ok(params)
}

/// Storage class from the claim spec, falling back to the legacy annotation
fn storage_class_of(claim: &PersistentVolumeClaim) -> Option<String> {
    claim
        .spec
        .as_ref()
        .and_then(|s| s.storage_class_name.clone())
        .or_else(|| claim.annotations().get(labels::PVC_STORAGE_CLASS).cloned())
}

fn round_up(value: i64, unit: i64) -> i64 {
    (value + unit - 1) / unit
}

/// Parse a Kubernetes resource quantity into bytes. Covers the plain and
/// binary/decimal suffixed integer forms claims use for storage requests.
fn parse_quantity(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    let value: i64 = digits
        .parse()
        .map_err(|_| ShepherdError::InvalidQuantity(raw.to_string()))?;

    let multiplier: i64 = match suffix {
        "" => 1,
        "k" => 1000,
        "M" => 1000 * 1000,
        "G" => 1000 * 1000 * 1000,
        "T" => 1000 * 1000 * 1000 * 1000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1_i64 << 40,
        _ => return Err(ShepherdError::InvalidQuantity(raw.to_string())),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| ShepherdError::InvalidQuantity(raw.to_string()))
}
