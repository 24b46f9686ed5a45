// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `TenantInstance` reconciliation.
//!
//! One pass reads the instance, refreshes its conditions from the cluster, asks the
//! phase state machine what to do, runs those effects and persists the resulting
//! status with the instance's resourceVersion as a precondition. A conflicting
//! status write restarts the pass from a fresh read.

use crate::constants::{KIND_TENANT_INSTANCE, MAX_CONFLICT_RETRIES};
use crate::context::Context;
use crate::crd::{validate_project_name, ConditionType, Phase, TenantInstance, TenantInstanceStatus};
use crate::errors::{Error, ProvisionError, SubResource};
use crate::metrics;
use crate::reconcilers::conditions::{aggregate, conditions_equal, invalid_spec, Lifecycle};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::jobs::{self, job_name, JobKind};
use crate::reconcilers::phase::{
    self, backoff_remaining, failure_backoff, Effect, Outcome, PhaseInput,
};
use crate::reconcilers::provisioner::{self, DesiredState};
use crate::reconcilers::should_reconcile;
use crate::status_reasons::REASON_PROVISION_FAILED;
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Reconcile one instance by name.
///
/// # Errors
///
/// Returns an error for transient failures the controller should retry with
/// backoff. Permanent failures are written to status and return `Ok`.
pub async fn reconcile_instance(ctx: Arc<Context>, name: &str) -> Result<Action, Error> {
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match reconcile_once(&ctx, name).await {
            Ok(action) => {
                metrics::record_reconciliation_success(KIND_TENANT_INSTANCE, start.elapsed());
                return Ok(action);
            }
            Err(Error::LeadershipLost) => {
                warn!("Leadership lost while reconciling TenantInstance {}, stopping", name);
                return Ok(Action::await_change());
            }
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                debug!(
                    "Conflict reconciling TenantInstance {} (attempt {}), retrying from a fresh read",
                    name, attempt
                );
            }
            Err(e) => {
                let err = if e.is_conflict() {
                    Error::ConflictRetriesExhausted { attempts: attempt }
                } else {
                    e
                };
                metrics::record_reconciliation_error(KIND_TENANT_INSTANCE, start.elapsed());
                metrics::record_error(KIND_TENANT_INSTANCE, err.metric_label());
                return Err(err);
            }
        }
    }
}

fn ensure_leader(ctx: &Context) -> Result<(), Error> {
    if ctx.leader.is_leader() {
        Ok(())
    } else {
        Err(Error::LeadershipLost)
    }
}

fn since(timestamp: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let at = DateTime::parse_from_rfc3339(timestamp?).ok()?;
    Some(
        now.signed_duration_since(at.with_timezone(&Utc))
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn aspect_for(resource: SubResource) -> Option<ConditionType> {
    match resource {
        SubResource::Namespace => Some(ConditionType::NamespaceReady),
        SubResource::Secrets => Some(ConditionType::SecretsReady),
        SubResource::HelmRelease => Some(ConditionType::HelmReleaseReady),
        SubResource::Ingress => Some(ConditionType::IngressReady),
        SubResource::Job | SubResource::Finalizer => None,
    }
}

/// True when the status differs in anything but condition timestamps.
fn status_differs(old: Option<&TenantInstanceStatus>, new: &TenantInstanceStatus) -> bool {
    let Some(old) = old else {
        return true;
    };
    let strip = |s: &TenantInstanceStatus| TenantInstanceStatus {
        conditions: Vec::new(),
        ..s.clone()
    };
    strip(old) != strip(new) || !conditions_equal(&old.conditions, &new.conditions)
}

async fn persist_status(
    ctx: &Context,
    instance: &TenantInstance,
    status: &TenantInstanceStatus,
) -> Result<(), Error> {
    if !status_differs(instance.status.as_ref(), status) {
        debug!("TenantInstance {} status unchanged, skipping update", instance.name_any());
        return Ok(());
    }

    ensure_leader(ctx)?;
    ctx.cluster
        .patch_instance_status(
            &instance.name_any(),
            &instance.resource_version().unwrap_or_default(),
            status,
        )
        .await?;
    Ok(())
}

/// An invalid spec is reported on conditions and otherwise left alone.
async fn reject_invalid_spec(
    ctx: &Context,
    instance: &TenantInstance,
    message: &str,
    now: &str,
) -> Result<Action, Error> {
    let name = instance.name_any();
    warn!("TenantInstance {} has an invalid spec: {}", name, message);
    metrics::record_error(KIND_TENANT_INSTANCE, "invalid_spec");

    // Nothing is provisioned before validation, so a deleted invalid instance
    // only needs its finalizer released.
    if instance.is_being_deleted() && has_finalizer(instance) {
        ensure_leader(ctx)?;
        remove_finalizer(ctx.cluster.as_ref(), instance).await?;
        metrics::clear_instance_phase(&name);
        return Ok(Action::await_change());
    }

    let mut status = instance.status.clone().unwrap_or_default();
    status.conditions = invalid_spec(&status.conditions, message, now).to_vec();
    persist_status(ctx, instance, &status).await?;
    metrics::set_instance_phase(&name, status.phase);
    Ok(Action::await_change())
}

#[allow(clippy::too_many_lines)]
async fn reconcile_once(ctx: &Context, name: &str) -> Result<Action, Error> {
    let Some(instance) = ctx.cluster.get_instance(name).await? else {
        debug!("TenantInstance {} not found, nothing to do", name);
        metrics::clear_instance_phase(name);
        return Ok(Action::await_change());
    };

    let now = Utc::now();
    let now_str = now.to_rfc3339();

    if let Err(e) = validate_project_name(&instance.spec.project_name) {
        return reject_invalid_spec(ctx, &instance, &e.to_string(), &now_str).await;
    }

    let status = instance.status.clone().unwrap_or_default();
    let previous = instance.phase();
    let paused = instance.spec.paused;
    let deleting = instance.is_being_deleted();
    let desired = DesiredState::new(&instance, &ctx.defaults);

    debug!(
        instance = %name,
        phase = %previous,
        paused,
        deleting,
        "Reconciling TenantInstance"
    );

    // Observe
    let mut observations = provisioner::observe(ctx, &desired).await?;

    let provisioning_job = match (&status.provisioning_job, previous) {
        (Some(job), Phase::ProvisioningInProgress) => jobs::observe(ctx, job).await?,
        _ => None,
    };
    let cleanup_job = match &status.cleanup_job {
        Some(job) if deleting => jobs::observe(ctx, job).await?,
        _ => None,
    };

    let lifecycle = if paused {
        Lifecycle::Paused
    } else if deleting || previous.is_deleting_path() {
        Lifecycle::Deleting
    } else {
        Lifecycle::Active
    };
    let mut conditions = aggregate(&status.conditions, &observations, lifecycle, &now_str);

    // Plan
    let input = PhaseInput {
        phase: previous,
        deleting,
        paused,
        generation_changed: should_reconcile(
            instance.metadata.generation,
            status.observed_generation,
        ),
        ready: conditions.is_true(ConditionType::Ready),
        has_finalizer: has_finalizer(&instance),
        provisioning_job,
        cleanup_job,
        cleanup_started: status.cleanup_job.is_some(),
        failure_count: status.failure_count,
        since_failure: since(status.last_failure_time.as_deref(), now),
        error_message: status.error_message.clone(),
    };
    let plan = phase::plan(&input);

    // Act
    let generation = instance.metadata.generation.unwrap_or(0);
    let mut current = instance.clone();
    let mut new_status = status.clone();
    let mut converged = false;
    let mut failure: Option<ProvisionError> = None;

    for effect in &plan.effects {
        ensure_leader(ctx)?;
        debug!("TenantInstance {}: running {:?}", name, effect);

        let result = match *effect {
            Effect::EnsureFinalizer => {
                let updated = ensure_finalizer(ctx.cluster.as_ref(), &current).await;
                updated
                    .map(|updated| current = updated)
                    .map_err(|e| ProvisionError::cluster(SubResource::Finalizer, e))
            }
            Effect::Converge => provisioner::converge(ctx, &desired)
                .await
                .map(|()| converged = true),
            Effect::EnsureJob(kind) => {
                let job = job_name(&desired.project, kind, generation, status.failure_count);
                let created = jobs::ensure_job(ctx, &current, &desired, kind, &job).await;
                created.map(|job| match kind {
                    JobKind::Provision => new_status.provisioning_job = Some(job),
                    JobKind::Cleanup => new_status.cleanup_job = Some(job),
                })
            }
            Effect::UninstallRelease => provisioner::uninstall_release(ctx, &desired).await,
            Effect::DeleteNamespace => provisioner::delete_namespace(ctx, &desired).await,
            Effect::ReleaseFinalizer => remove_finalizer(ctx.cluster.as_ref(), &current)
                .await
                .map_err(|e| ProvisionError::cluster(SubResource::Finalizer, e)),
        };

        if let Err(e) = result {
            if e.is_transient() {
                return Err(e.into());
            }
            warn!("TenantInstance {}: {:?} failed: {}", name, effect, e);
            failure = Some(e);
            break;
        }
    }

    if plan.finalize && failure.is_none() {
        info!("TenantInstance {} cleaned up, finalizer released", name);
        metrics::clear_instance_phase(name);
        metrics::record_resource_deleted(KIND_TENANT_INSTANCE);
        return Ok(Action::await_change());
    }

    // Fold the effects back into conditions.
    if converged || failure.is_some() {
        if converged {
            observations = provisioner::observe(ctx, &desired).await?;
        }
        if let Some(e) = &failure {
            if let Some(obs) = aspect_for(e.resource).and_then(|a| observations.get_mut(a)) {
                obs.ready = false;
                obs.reason = REASON_PROVISION_FAILED.to_string();
                obs.message = e.to_string();
            }
        }
        conditions = aggregate(&status.conditions, &observations, lifecycle, &now_str);
    }

    let outcome = Outcome {
        failed: failure.as_ref().map(ToString::to_string),
        ready: conditions.is_true(ConditionType::Ready),
    };
    let (next, error_message) = phase::settle(&plan, &outcome);

    // Status
    new_status.phase = next;
    new_status.conditions = conditions.to_vec();
    new_status.error_message = error_message;

    if next == Phase::Failed && (previous != Phase::Failed || failure.is_some()) {
        new_status.failure_count = status.failure_count.saturating_add(1);
        new_status.last_failure_time = Some(now_str.clone());
    } else if next == Phase::Running {
        new_status.failure_count = 0;
        new_status.last_failure_time = None;
    }

    if converged && failure.is_none() {
        new_status.namespace = Some(desired.namespace.clone());
        new_status.release_name = Some(desired.release_name.clone());
        new_status.admin_url = Some(desired.admin_url());
        new_status.api_url = Some(desired.api_url());
    }

    // The generation is processed once the instance runs ready on it.
    let generation_handled = converged || !input.generation_changed;
    if generation_handled && next == Phase::Running && outcome.ready && !paused {
        new_status.observed_generation = instance.metadata.generation;
    }

    persist_status(ctx, &current, &new_status).await?;

    // Report
    metrics::set_instance_phase(name, next);
    if next != previous {
        metrics::record_phase_transition(previous, next);
        info!("TenantInstance {} moved from {} to {}", name, previous, next);
    }

    let retry_in = if next != Phase::Failed {
        None
    } else if previous == Phase::Failed && failure.is_none() {
        backoff_remaining(&input)
    } else {
        Some(failure_backoff(new_status.failure_count))
    };
    let requeue = phase::requeue_after(previous, next, paused, outcome.ready, retry_in);
    let reason = phase::requeue_reason(previous, next, paused, outcome.ready);
    metrics::record_reconciliation_requeue(KIND_TENANT_INSTANCE, reason);
    debug!("TenantInstance {} requeue in {:?} ({})", name, requeue, reason);
    Ok(Action::requeue(requeue))
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod instance_tests;
