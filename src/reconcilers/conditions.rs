// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `TenantInstance` resources.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: one of the [`ConditionType`] names
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: a programmatic identifier (CamelCase)
//! - `message`: a human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status flip
//!
//! Inside the reconciler conditions live in a [`ConditionSet`], a map keyed by
//! condition type, so setting a condition is an upsert with one timestamp rule:
//! `lastTransitionTime` moves only when the status value changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use tenant_operator::crd::ConditionType;
//! use tenant_operator::reconcilers::conditions::ConditionSet;
//!
//! let mut set = ConditionSet::default();
//! set.set(ConditionType::NamespaceReady, true, "Ready", "namespace tenant-acme exists", "2025-01-01T00:00:00Z");
//! assert!(set.is_true(ConditionType::NamespaceReady));
//! ```

use crate::crd::{Condition, ConditionType};
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, REASON_ALL_READY, REASON_DELETING,
    REASON_INVALID_SPEC, REASON_NOT_READY, REASON_PAUSED, REASON_PENDING,
};
use std::collections::BTreeMap;

/// Create a condition with an explicit transition time.
#[must_use]
pub fn create_condition(
    condition_type: ConditionType,
    status: &str,
    reason: &str,
    message: &str,
    now: &str,
) -> Condition {
    Condition {
        r#type: condition_type.as_str().to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(now.to_string()),
    }
}

/// Compare two condition lists ignoring `lastTransitionTime`.
///
/// Used to decide whether a status write is needed at all.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        current.iter().any(|curr| {
            curr.r#type == new_cond.r#type
                && curr.status == new_cond.status
                && curr.reason == new_cond.reason
                && curr.message == new_cond.message
        })
    })
}

/// Health of one provisioned aspect, as observed on the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AspectObservation {
    pub ready: bool,
    pub reason: String,
    pub message: String,
}

impl AspectObservation {
    #[must_use]
    pub fn ready(reason: &str, message: impl Into<String>) -> Self {
        Self {
            ready: true,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_ready(reason: &str, message: impl Into<String>) -> Self {
        Self {
            ready: false,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// One observation per aspect condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observations {
    pub namespace: AspectObservation,
    pub secrets: AspectObservation,
    pub release: AspectObservation,
    pub ingress: AspectObservation,
}

impl Observations {
    #[must_use]
    pub fn get(&self, aspect: ConditionType) -> Option<&AspectObservation> {
        match aspect {
            ConditionType::NamespaceReady => Some(&self.namespace),
            ConditionType::SecretsReady => Some(&self.secrets),
            ConditionType::HelmReleaseReady => Some(&self.release),
            ConditionType::IngressReady => Some(&self.ingress),
            ConditionType::Ready => None,
        }
    }

    pub fn get_mut(&mut self, aspect: ConditionType) -> Option<&mut AspectObservation> {
        match aspect {
            ConditionType::NamespaceReady => Some(&mut self.namespace),
            ConditionType::SecretsReady => Some(&mut self.secrets),
            ConditionType::HelmReleaseReady => Some(&mut self.release),
            ConditionType::IngressReady => Some(&mut self.ingress),
            ConditionType::Ready => None,
        }
    }
}

/// Conditions keyed by type. Each type appears at most once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionSet {
    entries: BTreeMap<ConditionType, Condition>,
}

impl ConditionSet {
    /// Load the conditions currently stored on status. Unknown types are dropped.
    #[must_use]
    pub fn from_conditions(conditions: &[Condition]) -> Self {
        let entries = conditions
            .iter()
            .filter_map(|c| ConditionType::parse(&c.r#type).map(|t| (t, c.clone())))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.entries.get(&condition_type)
    }

    #[must_use]
    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        self.get(condition_type)
            .is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
    }

    /// Upsert a condition. The transition time is preserved unless the status flips.
    pub fn set(
        &mut self,
        condition_type: ConditionType,
        ready: bool,
        reason: &str,
        message: &str,
        now: &str,
    ) {
        let status = if ready {
            CONDITION_STATUS_TRUE
        } else {
            CONDITION_STATUS_FALSE
        };

        let last_transition_time = match self.entries.get(&condition_type) {
            Some(existing) if existing.status == status => existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| now.to_string()),
            _ => now.to_string(),
        };

        let mut condition = create_condition(condition_type, status, reason, message, now);
        condition.last_transition_time = Some(last_transition_time);
        self.entries.insert(condition_type, condition);
    }

    /// True only if every aspect condition is present and True.
    #[must_use]
    pub fn aspects_ready(&self) -> bool {
        ConditionType::ASPECTS.into_iter().all(|a| self.is_true(a))
    }

    /// Conditions in declaration order, ready to store on status.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Condition> {
        self.entries.values().cloned().collect()
    }
}

/// What the instance is doing, as far as the `Ready` reason is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Paused,
    Deleting,
}

/// Fold fresh observations into the previous conditions.
///
/// Every aspect gets a condition, True only when observed healthy. `Ready` is the
/// AND of the aspects; when it is False its message lists the failing aspects.
#[must_use]
pub fn aggregate(
    previous: &[Condition],
    observations: &Observations,
    lifecycle: Lifecycle,
    now: &str,
) -> ConditionSet {
    let mut set = ConditionSet::from_conditions(previous);

    for aspect in ConditionType::ASPECTS {
        if let Some(obs) = observations.get(aspect) {
            set.set(aspect, obs.ready, &obs.reason, &obs.message, now);
        }
    }

    let ready = set.aspects_ready();
    let (reason, message) = match (lifecycle, ready) {
        (Lifecycle::Paused, _) => (
            REASON_PAUSED,
            "Reconciliation is paused (spec.paused is true)".to_string(),
        ),
        (Lifecycle::Deleting, _) => (REASON_DELETING, "Instance is being deleted".to_string()),
        (Lifecycle::Active, true) => (REASON_ALL_READY, "All aspects are ready".to_string()),
        (Lifecycle::Active, false) => (REASON_NOT_READY, not_ready_message(&set)),
    };
    set.set(ConditionType::Ready, ready, reason, &message, now);

    set
}

fn not_ready_message(set: &ConditionSet) -> String {
    let failing: Vec<&str> = ConditionType::ASPECTS
        .into_iter()
        .filter(|a| !set.is_true(*a))
        .map(ConditionType::as_str)
        .collect();
    if failing.is_empty() {
        REASON_PENDING.to_string()
    } else {
        format!("Not ready: {}", failing.join(", "))
    }
}

/// Conditions for a spec rejected by validation: every condition False with the
/// validation message.
#[must_use]
pub fn invalid_spec(previous: &[Condition], message: &str, now: &str) -> ConditionSet {
    let mut set = ConditionSet::from_conditions(previous);
    for condition_type in ConditionType::ALL {
        set.set(condition_type, false, REASON_INVALID_SPEC, message, now);
    }
    set
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
