// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provisioning and cleanup jobs.
//!
//! Heavy stand-up and tear-down work runs as batch Jobs in the controller's job
//! namespace. Job names are deterministic per (instance, kind, generation, attempt),
//! which makes [`ensure_job`] idempotent: a second call finds the job the first one
//! created, even if the status write recording its name was lost.

use crate::cluster::ClusterError;
use crate::config::ControllerDefaults;
use crate::constants::{API_GROUP_VERSION, JOB_TTL_AFTER_FINISHED_SECS, KIND_TENANT_INSTANCE};
use crate::context::Context;
use crate::crd::TenantInstance;
use crate::errors::{ProvisionError, SubResource};
use crate::labels::{instance_labels, COMPONENT_JOB, TENANCY_JOB_KIND_LABEL};
use crate::metrics;
use crate::reconcilers::provisioner::DesiredState;
use crate::status_reasons::REASON_JOB_FAILED;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, info};

/// Which lifecycle step a job performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    Provision,
    Cleanup,
}

impl JobKind {
    /// Name segment, label value and container argument.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Provision => "provision",
            JobKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed outcome of a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    /// Failure detail from the job's `Failed` condition.
    Failed(String),
}

/// Deterministic job name: `<project>-<kind>-g<generation>-a<attempt>`.
#[must_use]
pub fn job_name(project: &str, kind: JobKind, generation: i64, attempt: u32) -> String {
    format!("{project}-{kind}-g{generation}-a{attempt}")
}

fn owner_reference(instance: &TenantInstance) -> OwnerReference {
    OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_TENANT_INSTANCE.to_string(),
        name: instance.name_any(),
        uid: instance.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Build the Job manifest for one provisioning or cleanup attempt.
#[must_use]
pub fn build_job(
    instance: &TenantInstance,
    desired: &DesiredState,
    kind: JobKind,
    name: &str,
    defaults: &ControllerDefaults,
) -> Job {
    let mut labels = instance_labels(&desired.project, COMPONENT_JOB);
    labels.insert(TENANCY_JOB_KIND_LABEL.to_string(), kind.as_str().to_string());

    let container = Container {
        name: kind.as_str().to_string(),
        image: Some(defaults.job_image.clone()),
        args: Some(vec![kind.as_str().to_string()]),
        env: Some(vec![
            env("TENANT_INSTANCE", &desired.instance_name),
            env("TENANT_PROJECT", &desired.project),
            env("TENANT_NAMESPACE", &desired.namespace),
            env("TENANT_RELEASE", &desired.release_name),
            env("TENANT_CREDENTIALS_SECRET", &desired.secret_name),
            env("TENANT_ADMIN_URL", &desired.admin_url()),
            env("TENANT_API_URL", &desired.api_url()),
        ]),
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(defaults.job_namespace.clone()),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner_reference(instance)]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(defaults.job_backoff_limit),
            active_deadline_seconds: Some(defaults.job_active_deadline_seconds),
            ttl_seconds_after_finished: Some(JOB_TTL_AFTER_FINISHED_SECS),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    service_account_name: defaults.job_service_account.clone(),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Map batch/v1 Job status to a [`JobState`].
#[must_use]
pub fn job_state(job: &Job) -> JobState {
    let Some(status) = job.status.as_ref() else {
        return JobState::Running;
    };

    if status.succeeded.unwrap_or(0) > 0 {
        return JobState::Succeeded;
    }

    let failed = status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == "Failed" && c.status == "True");
    match failed {
        Some(condition) => {
            let detail = match (condition.reason.as_deref(), condition.message.as_deref()) {
                (Some(reason), Some(message)) if !message.is_empty() => {
                    format!("{reason}: {message}")
                }
                (Some(reason), _) => reason.to_string(),
                (None, Some(message)) if !message.is_empty() => message.to_string(),
                _ => REASON_JOB_FAILED.to_string(),
            };
            JobState::Failed(detail)
        }
        None => JobState::Running,
    }
}

fn job_err(e: ClusterError) -> ProvisionError {
    ProvisionError::cluster(SubResource::Job, e)
}

/// Create the job unless it already exists. Returns the job name.
///
/// # Errors
///
/// Returns a [`ProvisionError`] if the job cannot be read or created.
pub async fn ensure_job(
    ctx: &Context,
    instance: &TenantInstance,
    desired: &DesiredState,
    kind: JobKind,
    name: &str,
) -> Result<String, ProvisionError> {
    let namespace = &ctx.defaults.job_namespace;

    if ctx
        .cluster
        .get_job(namespace, name)
        .await
        .map_err(job_err)?
        .is_some()
    {
        debug!("Reusing existing {} job {}/{}", kind, namespace, name);
        return Ok(name.to_string());
    }

    let job = build_job(instance, desired, kind, name, &ctx.defaults);
    match ctx.cluster.create_job(namespace, &job).await {
        Ok(_) => {
            info!("Created {} job {}/{}", kind, namespace, name);
            metrics::record_resource_created("Job");
        }
        Err(ClusterError::AlreadyExists(_)) => {
            debug!("{} job {}/{} created concurrently, reusing it", kind, namespace, name);
        }
        Err(e) => return Err(job_err(e)),
    }
    Ok(name.to_string())
}

/// Current state of a job, `None` if it does not exist.
///
/// # Errors
///
/// Returns a [`ProvisionError`] if the job cannot be read.
pub async fn observe(ctx: &Context, name: &str) -> Result<Option<JobState>, ProvisionError> {
    let job = ctx
        .cluster
        .get_job(&ctx.defaults.job_namespace, name)
        .await
        .map_err(job_err)?;
    Ok(job.as_ref().map(job_state))
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod jobs_tests;
