// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for tenant instances.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Layout
//!
//! Every `TenantInstance` carries one condition per provisioned aspect plus a single
//! encompassing `type: Ready` condition that is True only when every aspect is True.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: ProvisioningInProgress
//!   conditions:
//!     - type: NamespaceReady
//!       status: "True"
//!       reason: Ready
//!     - type: SecretsReady
//!       status: "True"
//!       reason: Ready
//!     - type: HelmReleaseReady
//!       status: "False"
//!       reason: ReleaseNotDeployed
//!       message: "release acme is pending-install"
//!     - type: IngressReady
//!       status: "True"
//!       reason: Ready
//!     - type: Ready
//!       status: "False"
//!       reason: NotReady
//!       message: "HelmReleaseReady is False"
//! ```

// ============================================================================
// Common Reasons
// ============================================================================

/// Every aspect condition is True.
///
/// Used only on the encompassing `type: Ready` condition.
pub const REASON_ALL_READY: &str = "AllReady";

/// The aspect's resource is present and matches the desired state.
pub const REASON_READY: &str = "Ready";

/// At least one aspect condition is not True.
pub const REASON_NOT_READY: &str = "NotReady";

/// The aspect has not been observed yet.
pub const REASON_PENDING: &str = "Pending";

// ============================================================================
// Aspect Reasons
// ============================================================================

/// The tenant namespace does not exist.
pub const REASON_NAMESPACE_MISSING: &str = "NamespaceMissing";

/// The tenant namespace exists but is terminating.
pub const REASON_NAMESPACE_TERMINATING: &str = "NamespaceTerminating";

/// The credentials secret does not exist.
pub const REASON_SECRET_MISSING: &str = "SecretMissing";

/// The credentials secret exists but lacks one or more required keys.
pub const REASON_SECRET_INCOMPLETE: &str = "SecretIncomplete";

/// No release with the expected name is installed.
pub const REASON_RELEASE_MISSING: &str = "ReleaseMissing";

/// The release exists but is not in the `deployed` state.
pub const REASON_RELEASE_NOT_DEPLOYED: &str = "ReleaseNotDeployed";

/// The installed release differs from the desired chart version or values.
pub const REASON_RELEASE_OUTDATED: &str = "ReleaseOutdated";

/// The ingress does not exist.
pub const REASON_INGRESS_MISSING: &str = "IngressMissing";

/// The ingress exists but its hosts or backends differ from the desired routes.
pub const REASON_INGRESS_DRIFTED: &str = "IngressDrifted";

/// The aspect could not be observed because the API call failed.
pub const REASON_OBSERVATION_FAILED: &str = "ObservationFailed";

// ============================================================================
// Lifecycle Reasons (Ready condition)
// ============================================================================

/// Reconciliation is suspended because `spec.paused` is true.
///
/// Not an error: the instance is intentionally held in its current phase.
pub const REASON_PAUSED: &str = "Paused";

/// The desired spec is malformed and was rejected before any side effect.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// The instance is being torn down.
pub const REASON_DELETING: &str = "Deleting";

/// Creating or updating the aspect's resource failed with a permanent error.
pub const REASON_PROVISION_FAILED: &str = "ProvisionFailed";

// ============================================================================
// Job Failure Reasons
// ============================================================================

/// Fallback reason when a failed job carries no failure condition detail.
pub const REASON_JOB_FAILED: &str = "JobFailed";

// ============================================================================
// Condition Status Values
// ============================================================================

pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";
