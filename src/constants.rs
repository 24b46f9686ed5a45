// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the tenant operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the tenant CRDs
pub const API_GROUP: &str = "tenancy.platform.io";

/// API version for the tenant CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "tenancy.platform.io/v1alpha1";

/// Kind name for `TenantInstance` resource
pub const KIND_TENANT_INSTANCE: &str = "TenantInstance";

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue interval for a Running instance whose Ready condition is True (5 minutes)
pub const RUNNING_REQUEUE_SECS: u64 = 300;

/// Requeue interval while a provisioning or cleanup job is running
pub const IN_PROGRESS_REQUEUE_SECS: u64 = 15;

/// Requeue interval right after a phase transition
pub const TRANSITION_REQUEUE_SECS: u64 = 2;

/// Requeue interval while an instance is paused (5 minutes)
pub const PAUSED_REQUEUE_SECS: u64 = 300;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Maximum attempts to re-run a reconcile after a status write conflict
pub const MAX_CONFLICT_RETRIES: u32 = 3;

// ============================================================================
// Failure Backoff Constants
// ============================================================================

/// Delay before the first retry out of Failed
pub const FAILURE_BACKOFF_BASE_SECS: u64 = 10;

/// Upper bound on the delay before retrying out of Failed (5 minutes)
pub const FAILURE_BACKOFF_MAX_SECS: u64 = 300;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period before a lease is renewed (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

/// Default lease name
pub const DEFAULT_LEASE_NAME: &str = "tenant-operator-leader";

// ============================================================================
// Provisioning Defaults
// ============================================================================

/// Prefix for tenant namespaces
pub const DEFAULT_NAMESPACE_PREFIX: &str = "tenant-";

/// Suffix for the generated credentials secret
pub const CREDENTIALS_SECRET_SUFFIX: &str = "-credentials";

/// Suffix appended to the project name for the API host
pub const API_HOST_SUFFIX: &str = "-api";

/// Service port targeted by ingress routes
pub const RELEASE_SERVICE_PORT: i32 = 80;

/// Default administrative user written to the credentials secret
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Random bytes per generated credential (base64 encoded to 32 characters)
pub const GENERATED_SECRET_BYTES: usize = 24;

/// Default job backoff limit
pub const DEFAULT_JOB_BACKOFF_LIMIT: i32 = 2;

/// Default job active deadline (30 minutes)
pub const DEFAULT_JOB_ACTIVE_DEADLINE_SECS: i64 = 1800;

/// Seconds a finished job is kept before garbage collection (1 day)
pub const JOB_TTL_AFTER_FINISHED_SECS: i32 = 86400;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
