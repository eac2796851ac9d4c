// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployment lifecycle operations and convergence checks.

use futures::future::try_join_all;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{info, instrument};

use crate::constants::convergence;
use crate::error::{Result, ShepherdError};
use crate::k8s::namespace_of;
use crate::retry::{run_until, Attempt, RetryPolicy};

/// Create the given deployment
pub async fn create_deployment(client: &Client, deployment: &Deployment) -> Result<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &namespace_of(deployment));
    Ok(api.create(&PostParams::default(), deployment).await?)
}

/// Delete the given deployment, waiting on dependents via foreground propagation
pub async fn delete_deployment(client: &Client, deployment: &Deployment) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &namespace_of(deployment));
    api.delete(&deployment.name_any(), &DeleteParams::foreground())
        .await?;
    Ok(())
}

/// Wait until the deployment reaches its desired replica count and every pod
/// of the deployment is fully running.
#[instrument(skip(client, deployment), fields(deployment = %deployment.name_any()))]
pub async fn validate_deployment(client: &Client, deployment: &Deployment) -> Result<()> {
    let policy = RetryPolicy::fixed(
        convergence::DEPLOYMENT_READY_TIMEOUT,
        convergence::DEPLOYMENT_READY_INTERVAL,
    );
    validate_deployment_with(client, deployment, &policy).await
}

/// `validate_deployment` with an explicit retry policy
pub async fn validate_deployment_with(
    client: &Client,
    deployment: &Deployment,
    policy: &RetryPolicy,
) -> Result<()> {
    let name = deployment.name_any();
    let namespace = namespace_of(deployment);

    run_until(policy, || deployment_ready(client, &name, &namespace))
        .await
        .map_err(ShepherdError::from)
}

async fn deployment_ready(
    client: &Client,
    name: &str,
    namespace: &str,
) -> std::result::Result<(), Attempt<ShepherdError>> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let deployment = api.get(name).await?;

    let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = deployment.status.unwrap_or_default();
    let available = status.available_replicas.unwrap_or(0);
    let ready = status.ready_replicas.unwrap_or(0);

    if available != desired {
        return Err(not_ready(
            name,
            format!("expected replicas: {desired}, available replicas: {available}"),
        ));
    }

    if ready != desired {
        return Err(not_ready(
            name,
            format!("expected replicas: {desired}, ready replicas: {ready}"),
        ));
    }

    let pods = deployment_pods(client, name, namespace).await?;
    for pod in &pods {
        if !is_pod_running(pod) {
            return Err(not_ready(
                name,
                format!("pod {} is not yet running", pod.name_any()),
            ));
        }
    }

    Ok(())
}

fn not_ready(id: &str, cause: String) -> Attempt<ShepherdError> {
    Attempt::Retry(ShepherdError::DeploymentNotReady {
        id: id.to_string(),
        cause,
    })
}

/// Wait until the deployment is gone and none of its pods remain.
///
/// A deployment the API no longer knows about is the desired end state, so a
/// 404 on the get is immediate success.
#[instrument(skip(client, deployment), fields(deployment = %deployment.name_any()))]
pub async fn validate_deployment_terminated(
    client: &Client,
    deployment: &Deployment,
) -> Result<()> {
    let policy = RetryPolicy::fixed(
        convergence::DEPLOYMENT_TEARDOWN_TIMEOUT,
        convergence::DEPLOYMENT_TEARDOWN_INTERVAL,
    );
    validate_deployment_terminated_with(client, deployment, &policy).await
}

/// `validate_deployment_terminated` with an explicit retry policy
pub async fn validate_deployment_terminated_with(
    client: &Client,
    deployment: &Deployment,
    policy: &RetryPolicy,
) -> Result<()> {
    let name = deployment.name_any();
    let namespace = namespace_of(deployment);

    run_until(policy, || deployment_terminated(client, &name, &namespace))
        .await
        .map_err(ShepherdError::from)
}

async fn deployment_terminated(
    client: &Client,
    name: &str,
    namespace: &str,
) -> std::result::Result<(), Attempt<ShepherdError>> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(_) => {}
        Err(kube::Error::Api(err)) if err.code == 404 => return Ok(()),
        Err(err) => return Err(err.into()),
    }

    let pods = deployment_pods(client, name, namespace).await?;
    if !pods.is_empty() {
        let names: Vec<String> = pods.iter().map(|p| p.name_any()).collect();
        return Err(Attempt::Retry(ShepherdError::DeploymentNotTerminated {
            id: name.to_string(),
            cause: format!("pods still present: {}", names.join(", ")),
        }));
    }

    Ok(())
}

/// Pods belonging to the deployment, resolved through its owned replica sets.
///
/// The deployment to pod linkage is two owner-reference hops; both are
/// re-resolved from live state on every call. A name that owns no replica set
/// yields an empty set, not an error.
#[instrument(skip(client))]
pub async fn deployment_pods(client: &Client, name: &str, namespace: &str) -> Result<Vec<Pod>> {
    let replica_sets: Api<ReplicaSet> = Api::namespaced(client.clone(), namespace);
    let owned: Vec<ReplicaSet> = replica_sets
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter(|rs| is_owned_by(rs, "Deployment", name))
        .collect();

    let pod_sets = try_join_all(owned.iter().map(|rs| replica_set_pods(client, rs))).await?;
    Ok(pod_sets.into_iter().flatten().collect())
}

/// Pods owned by the given replica set
pub async fn replica_set_pods(client: &Client, replica_set: &ReplicaSet) -> Result<Vec<Pod>> {
    let rs_name = replica_set.name_any();
    let pods: Api<Pod> = Api::namespaced(client.clone(), &namespace_of(replica_set));

    Ok(pods
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter(|pod| is_owned_by(pod, "ReplicaSet", &rs_name))
        .collect())
}

fn is_owned_by(resource: &impl ResourceExt, kind: &str, name: &str) -> bool {
    resource
        .owner_references()
        .iter()
        .any(|owner| owner.kind == kind && owner.name == name)
}

/// Delete the given pods immediately (grace period 0)
pub async fn delete_pods(client: &Client, pods: &[Pod]) -> Result<()> {
    let dp = DeleteParams::default().grace_period(0);

    for pod in pods {
        info!("Deleting pod {}", pod.name_any());
        let api: Api<Pod> = Api::namespaced(client.clone(), &namespace_of(pod));
        api.delete(&pod.name_any(), &dp).await?;
    }

    Ok(())
}

/// A pod counts as running once every regular container is running and no
/// init container is still running (an init container in the Running state
/// means the main containers have not started).
pub fn is_pod_running(pod: &Pod) -> bool {
    let init_still_running = pod
        .status
        .as_ref()
        .and_then(|s| s.init_container_statuses.as_ref())
        .into_iter()
        .flatten()
        .any(|c| c.state.as_ref().is_some_and(|s| s.running.is_some()));

    if init_still_running {
        return false;
    }

    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .all(|c| c.state.as_ref().is_some_and(|s| s.running.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{list_json, MockService};
    use k8s_openapi::api::core::v1::{ContainerState, ContainerStateRunning, ContainerStateWaiting, ContainerStatus, PodStatus};
    use kube::api::ObjectMeta;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn running_state() -> ContainerState {
        ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        }
    }

    fn waiting_state() -> ContainerState {
        ContainerState {
            waiting: Some(ContainerStateWaiting::default()),
            ..Default::default()
        }
    }

    fn container_status(state: ContainerState) -> ContainerStatus {
        ContainerStatus {
            name: "main".to_string(),
            state: Some(state),
            ..Default::default()
        }
    }

    fn make_pod(containers: Vec<ContainerStatus>, init: Vec<ContainerStatus>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("pod-1".to_string()),
                namespace: Some("test".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                container_statuses: Some(containers),
                init_container_statuses: Some(init),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_pod_running_all_containers_running() {
        let pod = make_pod(
            vec![
                container_status(running_state()),
                container_status(running_state()),
            ],
            vec![],
        );

        assert!(is_pod_running(&pod));
    }

    #[test]
    fn test_is_pod_running_with_waiting_container() {
        let pod = make_pod(
            vec![
                container_status(running_state()),
                container_status(waiting_state()),
            ],
            vec![],
        );

        assert!(!is_pod_running(&pod));
    }

    #[test]
    fn test_is_pod_running_with_running_init_container() {
        let pod = make_pod(
            vec![container_status(running_state())],
            vec![container_status(running_state())],
        );

        assert!(!is_pod_running(&pod));
    }

    #[test]
    fn test_is_pod_running_with_finished_init_container() {
        let pod = make_pod(
            vec![container_status(running_state())],
            vec![container_status(ContainerState::default())],
        );

        assert!(is_pod_running(&pod));
    }

    #[test]
    fn test_is_pod_running_with_no_reported_containers() {
        let pod = make_pod(vec![], vec![]);
        assert!(is_pod_running(&pod));
    }

    fn deployment_json(name: &str, desired: i32, available: i32, ready: i32) -> String {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": name, "namespace": "test", "uid": "dep-uid"},
            "spec": {
                "replicas": desired,
                "selector": {"matchLabels": {"app": name}},
                "template": {
                    "metadata": {"labels": {"app": name}},
                    "spec": {"containers": []}
                }
            },
            "status": {
                "replicas": desired,
                "availableReplicas": available,
                "readyReplicas": ready
            }
        })
        .to_string()
    }

    fn replica_set_json(name: &str, owner: &str) -> Value {
        json!({
            "metadata": {
                "name": name,
                "namespace": "test",
                "uid": format!("{name}-uid"),
                "ownerReferences": [{
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "name": owner,
                    "uid": format!("{owner}-uid"),
                    "controller": true
                }]
            }
        })
    }

    fn pod_json(name: &str, owner: &str, running: bool) -> Value {
        let state = if running {
            json!({"running": {"startedAt": "2026-01-01T00:00:00Z"}})
        } else {
            json!({"waiting": {"reason": "ContainerCreating"}})
        };

        json!({
            "metadata": {
                "name": name,
                "namespace": "test",
                "uid": format!("{name}-uid"),
                "ownerReferences": [{
                    "apiVersion": "apps/v1",
                    "kind": "ReplicaSet",
                    "name": owner,
                    "uid": format!("{owner}-uid"),
                    "controller": true
                }]
            },
            "status": {
                "containerStatuses": [{
                    "name": "main",
                    "ready": running,
                    "restartCount": 0,
                    "image": "img",
                    "imageID": "",
                    "state": state
                }]
            }
        })
    }

    fn make_deployment(name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn short_policy() -> RetryPolicy {
        RetryPolicy::fixed(Duration::ZERO, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_deployment_pods_resolves_both_owner_hops() {
        let mock = MockService::new()
            .on_get(
                "/apis/apps/v1/namespaces/test/replicasets",
                200,
                &list_json(
                    "apps/v1",
                    "ReplicaSetList",
                    &[
                        replica_set_json("web-abc123", "web"),
                        replica_set_json("other-def456", "other"),
                    ],
                ),
            )
            .on_get(
                "/api/v1/namespaces/test/pods",
                200,
                &list_json(
                    "v1",
                    "PodList",
                    &[
                        pod_json("web-abc123-x", "web-abc123", true),
                        pod_json("web-abc123-y", "web-abc123", true),
                        pod_json("other-def456-z", "other-def456", true),
                    ],
                ),
            );

        let pods = deployment_pods(&mock.client(), "web", "test")
            .await
            .expect("pod resolution");

        let names: Vec<String> = pods.iter().map(|p| p.name_any()).collect();
        assert_eq!(names, vec!["web-abc123-x", "web-abc123-y"]);
    }

    #[tokio::test]
    async fn test_deployment_pods_empty_when_no_replica_set_is_owned() {
        let mock = MockService::new().on_get(
            "/apis/apps/v1/namespaces/test/replicasets",
            200,
            &list_json(
                "apps/v1",
                "ReplicaSetList",
                &[replica_set_json("other-def456", "other")],
            ),
        );

        let pods = deployment_pods(&mock.client(), "web", "test")
            .await
            .expect("pod resolution");

        assert!(pods.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_deployment_succeeds_when_converged() {
        let mock = MockService::new()
            .on_get(
                "/apis/apps/v1/namespaces/test/deployments/web",
                200,
                &deployment_json("web", 2, 2, 2),
            )
            .on_get(
                "/apis/apps/v1/namespaces/test/replicasets",
                200,
                &list_json(
                    "apps/v1",
                    "ReplicaSetList",
                    &[replica_set_json("web-abc123", "web")],
                ),
            )
            .on_get(
                "/api/v1/namespaces/test/pods",
                200,
                &list_json(
                    "v1",
                    "PodList",
                    &[
                        pod_json("web-abc123-x", "web-abc123", true),
                        pod_json("web-abc123-y", "web-abc123", true),
                    ],
                ),
            );

        validate_deployment_with(&mock.client(), &make_deployment("web"), &short_policy())
            .await
            .expect("deployment should validate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_deployment_times_out_on_replica_mismatch() {
        let mock = MockService::new().on_get(
            "/apis/apps/v1/namespaces/test/deployments/web",
            200,
            &deployment_json("web", 2, 1, 2),
        );

        let err = validate_deployment_with(
            &mock.client(),
            &make_deployment("web"),
            &short_policy(),
        )
        .await
        .expect_err("deployment should not validate");

        match err {
            ShepherdError::Timeout { source, .. } => match *source {
                ShepherdError::DeploymentNotReady { id, cause } => {
                    assert_eq!(id, "web");
                    assert!(cause.contains("available replicas: 1"));
                }
                other => panic!("unexpected cause: {other}"),
            },
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_deployment_times_out_on_pod_not_running() {
        let mock = MockService::new()
            .on_get(
                "/apis/apps/v1/namespaces/test/deployments/web",
                200,
                &deployment_json("web", 1, 1, 1),
            )
            .on_get(
                "/apis/apps/v1/namespaces/test/replicasets",
                200,
                &list_json(
                    "apps/v1",
                    "ReplicaSetList",
                    &[replica_set_json("web-abc123", "web")],
                ),
            )
            .on_get(
                "/api/v1/namespaces/test/pods",
                200,
                &list_json(
                    "v1",
                    "PodList",
                    &[pod_json("web-abc123-x", "web-abc123", false)],
                ),
            );

        let err = validate_deployment_with(
            &mock.client(),
            &make_deployment("web"),
            &short_policy(),
        )
        .await
        .expect_err("deployment should not validate");

        match err {
            ShepherdError::Timeout { source, .. } => {
                assert!(source.to_string().contains("web-abc123-x is not yet running"));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_terminated_succeeds_immediately_on_absent_deployment() {
        // No responses registered: every request 404s, which is the desired
        // end state. A zero timeout shows the success path never waits.
        let mock = MockService::new();

        validate_deployment_terminated_with(
            &mock.client(),
            &make_deployment("web"),
            &short_policy(),
        )
        .await
        .expect("absent deployment counts as terminated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_terminated_times_out_while_pods_remain() {
        let mock = MockService::new()
            .on_get(
                "/apis/apps/v1/namespaces/test/deployments/web",
                200,
                &deployment_json("web", 1, 1, 1),
            )
            .on_get(
                "/apis/apps/v1/namespaces/test/replicasets",
                200,
                &list_json(
                    "apps/v1",
                    "ReplicaSetList",
                    &[replica_set_json("web-abc123", "web")],
                ),
            )
            .on_get(
                "/api/v1/namespaces/test/pods",
                200,
                &list_json(
                    "v1",
                    "PodList",
                    &[pod_json("web-abc123-x", "web-abc123", true)],
                ),
            );

        let err = validate_deployment_terminated_with(
            &mock.client(),
            &make_deployment("web"),
            &short_policy(),
        )
        .await
        .expect_err("pods still present");

        match err {
            ShepherdError::Timeout { source, .. } => match *source {
                ShepherdError::DeploymentNotTerminated { id, cause } => {
                    assert_eq!(id, "web");
                    assert!(cause.contains("web-abc123-x"));
                }
                other => panic!("unexpected cause: {other}"),
            },
            other => panic!("expected timeout, got {other}"),
        }
    }
}
