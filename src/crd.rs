// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for tenant instances.
//!
//! A [`TenantInstance`] declares one isolated tenant application stack. The owner
//! writes the spec; the controller owns the status subresource and drives the
//! instance through its [`Phase`] lifecycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use tenant_operator::crd::{TenantInstance, TenantInstanceSpec};
//!
//! let instance = TenantInstance::new(
//!     "acme",
//!     TenantInstanceSpec {
//!         project_name: "acme".to_string(),
//!         ingress_class: None,
//!         ingress_domain: Some("tenants.example.com".to_string()),
//!         release_version: None,
//!         paused: false,
//!     },
//! );
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a project name.
///
/// Derived object names append suffixes (namespace prefix, `-credentials`,
/// job suffixes), so the budget is tighter than a bare DNS label.
pub const MAX_PROJECT_NAME_LEN: usize = 40;

/// Coarse lifecycle state of a [`TenantInstance`].
///
/// This is the single definition of the phase vocabulary. Status, metrics and the
/// printable columns all read it through [`Phase::ALL`] and [`Phase::as_str`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Phase {
    /// Declared, not yet acted upon.
    #[default]
    Pending,
    /// Cluster objects are being converged and the provisioning job is being created.
    Provisioning,
    /// Provisioning job is running.
    ProvisioningInProgress,
    /// Provisioned and ready.
    Running,
    /// Deletion observed; the cleanup job is being created.
    Deleting,
    /// Cleanup job is running.
    DeletingInProgress,
    /// The last attempt failed. Retried automatically unless paused.
    Failed,
}

impl Phase {
    /// Every phase, in lifecycle order.
    pub const ALL: [Phase; 7] = [
        Phase::Pending,
        Phase::Provisioning,
        Phase::ProvisioningInProgress,
        Phase::Running,
        Phase::Deleting,
        Phase::DeletingInProgress,
        Phase::Failed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Provisioning => "Provisioning",
            Phase::ProvisioningInProgress => "ProvisioningInProgress",
            Phase::Running => "Running",
            Phase::Deleting => "Deleting",
            Phase::DeletingInProgress => "DeletingInProgress",
            Phase::Failed => "Failed",
        }
    }

    /// True for `Deleting` and `DeletingInProgress`.
    #[must_use]
    pub fn is_deleting_path(self) -> bool {
        matches!(self, Phase::Deleting | Phase::DeletingInProgress)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition types reported on a [`TenantInstance`].
///
/// Declaration order is the order conditions appear in status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    NamespaceReady,
    SecretsReady,
    HelmReleaseReady,
    IngressReady,
    /// Aggregate of every aspect condition.
    Ready,
}

impl ConditionType {
    pub const ALL: [ConditionType; 5] = [
        ConditionType::NamespaceReady,
        ConditionType::SecretsReady,
        ConditionType::HelmReleaseReady,
        ConditionType::IngressReady,
        ConditionType::Ready,
    ];

    /// Per-aspect conditions folded into [`ConditionType::Ready`].
    pub const ASPECTS: [ConditionType; 4] = [
        ConditionType::NamespaceReady,
        ConditionType::SecretsReady,
        ConditionType::HelmReleaseReady,
        ConditionType::IngressReady,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::NamespaceReady => "NamespaceReady",
            ConditionType::SecretsReady => "SecretsReady",
            ConditionType::HelmReleaseReady => "HelmReleaseReady",
            ConditionType::IngressReady => "IngressReady",
            ConditionType::Ready => "Ready",
        }
    }

    /// Parse a condition type string from status. Unknown types yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents an observation of one aspect of the instance.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, one of the [`ConditionType`] names.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `TenantInstance` declares one isolated tenant application stack.
///
/// # Example
///
/// ```yaml
/// apiVersion: tenancy.platform.io/v1alpha1
/// kind: TenantInstance
/// metadata:
///   name: acme
/// spec:
///   projectName: acme
///   ingressDomain: tenants.example.com
///   releaseVersion: "1.4.2"
///   paused: false
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "tenancy.platform.io",
    version = "v1alpha1",
    kind = "TenantInstance",
    shortname = "ti",
    doc = "TenantInstance declares an isolated tenant application stack: a namespace, generated credentials, a packaged application release and ingress routing, provisioned and torn down by batch jobs.",
    printcolumn = r#"{"name":"Project","type":"string","jsonPath":".spec.projectName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "TenantInstanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct TenantInstanceSpec {
    /// Cluster-unique project name. Used to derive the namespace, release, secret,
    /// ingress hosts and job names, so it must be a DNS label.
    #[schemars(regex(pattern = r"^[a-z0-9]([-a-z0-9]{0,38}[a-z0-9])?$"))]
    pub project_name: String,

    /// Ingress class for the tenant routes. Falls back to the controller default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,

    /// Base domain for the tenant hosts. Falls back to the controller default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,

    /// Chart version of the packaged application. Falls back to the controller default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,

    /// Suspends all phase transitions and side effects while true.
    #[serde(default)]
    pub paused: bool,
}

/// `TenantInstance` status, owned by the controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantInstanceStatus {
    #[serde(default)]
    pub phase: Phase,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Public URL of the administrative UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_url: Option<String>,

    /// Public URL of the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Failure detail. Only populated while the phase is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_job: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_job: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    /// Consecutive failed attempts since the instance was last `Running`.
    #[serde(default)]
    pub failure_count: u32,

    /// When the instance last entered `Failed` (RFC3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<String>,
}

impl TenantInstance {
    /// Current phase, `Pending` when no status has been written yet.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// True once the orchestration platform has signalled deletion.
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

/// Validation failure for a malformed spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("projectName must not be empty")]
    EmptyProjectName,

    #[error("projectName '{name}' is longer than {max} characters")]
    ProjectNameTooLong { name: String, max: usize },

    #[error("projectName '{name}' must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric")]
    InvalidProjectName { name: String },
}

/// Check that a project name is a DNS label within the length budget.
///
/// # Errors
///
/// Returns a [`SpecError`] describing the first violated rule.
pub fn validate_project_name(name: &str) -> Result<(), SpecError> {
    if name.is_empty() {
        return Err(SpecError::EmptyProjectName);
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(SpecError::ProjectNameTooLong {
            name: name.to_string(),
            max: MAX_PROJECT_NAME_LEN,
        });
    }

    let bytes = name.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid_body = bytes.iter().all(|&b| is_alnum(b) || b == b'-');
    let valid_edges = is_alnum(bytes[0]) && is_alnum(bytes[bytes.len() - 1]);

    if valid_body && valid_edges {
        Ok(())
    } else {
        Err(SpecError::InvalidProjectName {
            name: name.to_string(),
        })
    }
}
