// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to the orchestration API.
//!
//! Reconcilers never talk to `kube::Api` directly. They go through [`ClusterApi`], which
//! exposes exactly the calls the lifecycle needs, so the same reconcile code runs against
//! a real cluster ([`KubeClusterApi`]) or an in-memory fake in tests.

use crate::crd::{TenantInstance, TenantInstanceStatus};
use crate::reconcilers::retry::retry_api_call;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;

/// Typed failure from an orchestration API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// The write carried a stale resourceVersion.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("API error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// The API server could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Client-side failure that is not worth retrying (auth, invalid request).
    #[error("client error: {0}")]
    Client(String),
}

impl ClusterError {
    /// True for failures that may succeed on a later attempt: conflicts, rate limits,
    /// server errors and transport failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::Conflict(_) | ClusterError::Transport(_) => true,
            ClusterError::Api { code, .. } => *code == 429 || (500..600).contains(code),
            ClusterError::AlreadyExists(_)
            | ClusterError::Serialization(_)
            | ClusterError::Client(_) => false,
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists(ae.message.clone())
            }
            kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict(ae.message.clone()),
            kube::Error::Api(ae) => ClusterError::Api {
                code: ae.code,
                reason: ae.reason.clone(),
                message: ae.message.clone(),
            },
            kube::Error::Service(e) => ClusterError::Transport(e.to_string()),
            kube::Error::SerdeError(e) => ClusterError::Serialization(e.to_string()),
            other => ClusterError::Client(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::Serialization(err.to_string())
    }
}

/// The orchestration API calls the lifecycle depends on.
///
/// `get_*` calls return `Ok(None)` when the object does not exist. Writes that carry a
/// `resource_version` are rejected with [`ClusterError::Conflict`] when the stored
/// object has moved on.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_instance(&self, name: &str) -> Result<Option<TenantInstance>, ClusterError>;

    async fn patch_instance_status(
        &self,
        name: &str,
        resource_version: &str,
        status: &TenantInstanceStatus,
    ) -> Result<TenantInstance, ClusterError>;

    async fn set_instance_finalizers(
        &self,
        name: &str,
        resource_version: &str,
        finalizers: &[String],
    ) -> Result<TenantInstance, ClusterError>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError>;
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;
    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;

    /// Delete a namespace. Returns `false` if it was already gone.
    async fn delete_namespace(&self, name: &str) -> Result<bool, ClusterError>;

    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, ClusterError>;
    async fn create_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, ClusterError>;
    async fn replace_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, ClusterError>;

    async fn get_ingress(&self, namespace: &str, name: &str)
        -> Result<Option<Ingress>, ClusterError>;
    async fn create_ingress(&self, namespace: &str, ingress: &Ingress)
        -> Result<Ingress, ClusterError>;
    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress)
        -> Result<Ingress, ClusterError>;

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError>;
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError>;
}

/// [`ClusterApi`] over a live `kube::Client`.
///
/// Reads and idempotent writes are retried on transient errors. Writes guarded by a
/// resourceVersion are not: a conflict is returned to the caller, which restarts
/// from a fresh read.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn instances(&self) -> Api<TenantInstance> {
        Api::all(self.client.clone())
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

/// Optional status keys. A merge patch only removes a key when it is sent as `null`.
const CLEARABLE_STATUS_KEYS: [&str; 9] = [
    "namespace",
    "adminUrl",
    "apiUrl",
    "errorMessage",
    "observedGeneration",
    "provisioningJob",
    "cleanupJob",
    "releaseName",
    "lastFailureTime",
];

/// Merge patch writing `status` in full, guarded by `resource_version`.
///
/// Unset optional fields are sent as `null` so they are removed from the stored status
/// instead of surviving the merge.
///
/// # Errors
///
/// Returns [`ClusterError::Serialization`] if the status cannot be serialized.
pub fn status_patch(
    resource_version: &str,
    status: &TenantInstanceStatus,
) -> Result<serde_json::Value, ClusterError> {
    let mut body = serde_json::to_value(status)?;
    if let Some(fields) = body.as_object_mut() {
        for key in CLEARABLE_STATUS_KEYS {
            fields
                .entry(key.to_string())
                .or_insert(serde_json::Value::Null);
        }
    }
    Ok(json!({
        "metadata": { "resourceVersion": resource_version },
        "status": body,
    }))
}

fn object_name<K: kube::Resource>(obj: &K) -> Result<&str, ClusterError> {
    obj.meta()
        .name
        .as_deref()
        .ok_or_else(|| ClusterError::Client("object has no metadata.name".to_string()))
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_instance(&self, name: &str) -> Result<Option<TenantInstance>, ClusterError> {
        let api = self.instances();
        retry_api_call(|| api.get_opt(name), &format!("get TenantInstance {name}")).await
    }

    async fn patch_instance_status(
        &self,
        name: &str,
        resource_version: &str,
        status: &TenantInstanceStatus,
    ) -> Result<TenantInstance, ClusterError> {
        let patch = status_patch(resource_version, status)?;
        Ok(self
            .instances()
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn set_instance_finalizers(
        &self,
        name: &str,
        resource_version: &str,
        finalizers: &[String],
    ) -> Result<TenantInstance, ClusterError> {
        let patch = json!({
            "metadata": {
                "resourceVersion": resource_version,
                "finalizers": finalizers,
            }
        });
        Ok(self
            .instances()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        let api = self.namespaces();
        retry_api_call(|| api.get_opt(name), &format!("get Namespace {name}")).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        Ok(self
            .namespaces()
            .create(&PostParams::default(), namespace)
            .await?)
    }

    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = object_name(namespace)?;
        Ok(self
            .namespaces()
            .replace(name, &PostParams::default(), namespace)
            .await?)
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, ClusterError> {
        match self.namespaces().delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(|| api.get_opt(name), &format!("get Secret {namespace}/{name}")).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), secret).await?)
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .replace(object_name(secret)?, &PostParams::default(), secret)
            .await?)
    }

    async fn get_ingress(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Ingress>, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(|| api.get_opt(name), &format!("get Ingress {namespace}/{name}")).await
    }

    async fn create_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> Result<Ingress, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), ingress).await?)
    }

    async fn replace_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> Result<Ingress, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .replace(object_name(ingress)?, &PostParams::default(), ingress)
            .await?)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(|| api.get_opt(name), &format!("get Job {namespace}/{name}")).await
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), job).await?)
    }
}
