// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle state machine for tenant instances.
//!
//! Everything here is pure. [`plan`] looks at the current phase and the latest
//! observations and returns the side effects to run plus the phase to move to if
//! they succeed. The reconciler runs the effects and calls [`settle`] with the
//! outcome to get the phase it persists.
//!
//! # Transitions
//!
//! ```text
//! Pending ──► Provisioning ──► ProvisioningInProgress ──► Running
//!                 ▲                     │                    │
//!                 │                     ▼                    │ deletion
//!              Failed ◄──────────── (job failed)             ▼
//!                 │                                      Deleting ──► DeletingInProgress ──► finalized
//!                 └──────────────────── (cleanup job failed) ◄───────────────┘
//! ```
//!
//! - Deletion wins over any forward transition observed in the same reconcile.
//! - `paused` holds the phase and schedules no effects, deletion included.
//! - `Failed` is retried after an exponential backoff on the failure count. A
//!   deletion signal skips the backoff unless the failure was the cleanup job itself.
//! - One transition per reconcile.

use crate::constants::{
    FAILURE_BACKOFF_BASE_SECS, FAILURE_BACKOFF_MAX_SECS, IN_PROGRESS_REQUEUE_SECS,
    PAUSED_REQUEUE_SECS, RUNNING_REQUEUE_SECS, TRANSITION_REQUEUE_SECS,
};
use crate::crd::Phase;
use crate::reconcilers::jobs::{JobKind, JobState};
use std::time::Duration;

/// Everything the state machine needs to decide one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhaseInput {
    pub phase: Phase,
    /// The platform signalled deletion.
    pub deleting: bool,
    pub paused: bool,
    /// `metadata.generation` differs from `status.observedGeneration`.
    pub generation_changed: bool,
    /// Aggregate `Ready` condition before this step.
    pub ready: bool,
    pub has_finalizer: bool,
    pub provisioning_job: Option<JobState>,
    pub cleanup_job: Option<JobState>,
    /// A cleanup job is recorded on status, whether or not it still exists.
    pub cleanup_started: bool,
    pub failure_count: u32,
    /// Time since the instance last entered `Failed`.
    pub since_failure: Option<Duration>,
    /// Error message currently on status.
    pub error_message: Option<String>,
}

/// A side effect the reconciler must run, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    EnsureFinalizer,
    /// Create or update namespace, secret, release and ingress.
    Converge,
    EnsureJob(JobKind),
    UninstallRelease,
    DeleteNamespace,
    ReleaseFinalizer,
}

/// Result of one planning step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub effects: Vec<Effect>,
    /// Phase once every effect succeeded.
    pub target: Phase,
    /// Phase to use instead of `target` if the instance is not ready afterwards.
    pub unless_ready: Option<Phase>,
    /// Error message to record when `target` is `Failed`.
    pub error_message: Option<String>,
    /// The finalizer is released; the instance is gone once effects succeed.
    pub finalize: bool,
}

impl Plan {
    fn to(target: Phase, effects: Vec<Effect>) -> Self {
        Self {
            effects,
            target,
            unless_ready: None,
            error_message: None,
            finalize: false,
        }
    }

    fn hold(input: &PhaseInput) -> Self {
        Self {
            error_message: (input.phase == Phase::Failed)
                .then(|| input.error_message.clone())
                .flatten(),
            ..Self::to(input.phase, Vec::new())
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            error_message: Some(detail),
            ..Self::to(Phase::Failed, Vec::new())
        }
    }

    #[must_use]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    #[must_use]
    pub fn runs(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

/// How the effects of a plan went.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Detail of a permanent effect failure.
    pub failed: Option<String>,
    /// Aggregate readiness after the effects.
    pub ready: bool,
}

/// Delay before retrying a `Failed` instance: 10s doubling per failure, capped at 5 min.
#[must_use]
pub fn failure_backoff(failure_count: u32) -> Duration {
    let exponent = failure_count.saturating_sub(1).min(16);
    let secs = FAILURE_BACKOFF_BASE_SECS
        .saturating_mul(1u64 << exponent)
        .min(FAILURE_BACKOFF_MAX_SECS);
    Duration::from_secs(secs)
}

/// Remaining backoff for a `Failed` instance, `None` once it has elapsed.
#[must_use]
pub fn backoff_remaining(input: &PhaseInput) -> Option<Duration> {
    let since = input.since_failure?;
    failure_backoff(input.failure_count)
        .checked_sub(since)
        .filter(|d| !d.is_zero())
}

/// Decide the next step.
#[must_use]
pub fn plan(input: &PhaseInput) -> Plan {
    if input.paused {
        return Plan::hold(input);
    }
    if input.deleting {
        return plan_deletion(input);
    }

    let mut plan = plan_forward(input);
    if !input.has_finalizer && plan.has_effects() && !plan.runs(Effect::EnsureFinalizer) {
        plan.effects.insert(0, Effect::EnsureFinalizer);
    }
    plan
}

fn plan_deletion(input: &PhaseInput) -> Plan {
    // Nothing holds the instance; the platform removes it.
    if !input.has_finalizer {
        return Plan::hold(input);
    }

    match input.phase {
        Phase::Deleting => Plan::to(
            Phase::DeletingInProgress,
            vec![Effect::UninstallRelease, Effect::EnsureJob(JobKind::Cleanup)],
        ),
        Phase::DeletingInProgress => match &input.cleanup_job {
            None => Plan::to(Phase::Deleting, Vec::new()),
            Some(JobState::Running) => Plan::hold(input),
            Some(JobState::Succeeded) => Plan {
                finalize: true,
                ..Plan::to(
                    Phase::DeletingInProgress,
                    vec![Effect::DeleteNamespace, Effect::ReleaseFinalizer],
                )
            },
            Some(JobState::Failed(detail)) => Plan::failed(detail.clone()),
        },
        // A failed cleanup is retried after the backoff; any other failure yields to deletion.
        Phase::Failed if input.cleanup_started && backoff_remaining(input).is_some() => {
            Plan::hold(input)
        }
        Phase::Pending
        | Phase::Provisioning
        | Phase::ProvisioningInProgress
        | Phase::Running
        | Phase::Failed => Plan::to(Phase::Deleting, Vec::new()),
    }
}

fn plan_forward(input: &PhaseInput) -> Plan {
    let refresh = input.generation_changed || !input.ready;

    match input.phase {
        Phase::Pending => Plan::to(Phase::Provisioning, vec![Effect::EnsureFinalizer]),
        Phase::Provisioning => Plan::to(
            Phase::ProvisioningInProgress,
            vec![Effect::Converge, Effect::EnsureJob(JobKind::Provision)],
        ),
        Phase::ProvisioningInProgress => {
            let effects = if refresh {
                vec![Effect::Converge]
            } else {
                Vec::new()
            };
            match &input.provisioning_job {
                None => Plan::to(Phase::Provisioning, Vec::new()),
                Some(JobState::Running) => Plan::to(Phase::ProvisioningInProgress, effects),
                Some(JobState::Succeeded) => Plan {
                    unless_ready: Some(Phase::ProvisioningInProgress),
                    ..Plan::to(Phase::Running, effects)
                },
                Some(JobState::Failed(detail)) => Plan::failed(detail.clone()),
            }
        }
        Phase::Running if refresh => Plan::to(Phase::Running, vec![Effect::Converge]),
        Phase::Running => Plan::hold(input),
        Phase::Failed if backoff_remaining(input).is_some() => Plan::hold(input),
        Phase::Failed => Plan::to(Phase::Provisioning, Vec::new()),
        // Only reachable with a deletion signal, which is handled above.
        Phase::Deleting | Phase::DeletingInProgress => Plan::hold(input),
    }
}

/// Phase and error message to persist after running a plan's effects.
#[must_use]
pub fn settle(plan: &Plan, outcome: &Outcome) -> (Phase, Option<String>) {
    if let Some(detail) = &outcome.failed {
        return (Phase::Failed, Some(detail.clone()));
    }

    let phase = match plan.unless_ready {
        Some(fallback) if !outcome.ready => fallback,
        _ => plan.target,
    };
    let error = if phase == Phase::Failed {
        plan.error_message.clone()
    } else {
        None
    };
    (phase, error)
}

/// How long to wait before the next reconcile.
///
/// `retry_in` is the remaining failure backoff when `next` is `Failed`.
#[must_use]
pub fn requeue_after(
    previous: Phase,
    next: Phase,
    paused: bool,
    ready: bool,
    retry_in: Option<Duration>,
) -> Duration {
    if paused {
        return Duration::from_secs(PAUSED_REQUEUE_SECS);
    }
    if next == Phase::Failed {
        return retry_in.unwrap_or(Duration::from_secs(TRANSITION_REQUEUE_SECS));
    }
    if next != previous {
        return Duration::from_secs(TRANSITION_REQUEUE_SECS);
    }
    match next {
        Phase::Running if ready => Duration::from_secs(RUNNING_REQUEUE_SECS),
        Phase::Running | Phase::ProvisioningInProgress | Phase::DeletingInProgress => {
            Duration::from_secs(IN_PROGRESS_REQUEUE_SECS)
        }
        Phase::Pending | Phase::Provisioning | Phase::Deleting | Phase::Failed => {
            Duration::from_secs(TRANSITION_REQUEUE_SECS)
        }
    }
}

/// Metric label for the delay chosen by [`requeue_after`].
#[must_use]
pub fn requeue_reason(previous: Phase, next: Phase, paused: bool, ready: bool) -> &'static str {
    if paused {
        return "paused";
    }
    if next == Phase::Failed {
        return "backoff";
    }
    if next != previous {
        return "transition";
    }
    match next {
        Phase::Running if ready => "resync",
        Phase::Running | Phase::ProvisioningInProgress | Phase::DeletingInProgress => "in_progress",
        Phase::Pending | Phase::Provisioning | Phase::Deleting | Phase::Failed => "transition",
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod phase_tests;
