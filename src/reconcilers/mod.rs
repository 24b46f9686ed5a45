// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `TenantInstance` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `TenantInstance` changes and the jobs they own
//! 2. **Observe** - Read the namespace, credentials, release, ingress and jobs
//! 3. **Plan** - Run the lifecycle state machine on the observations
//! 4. **Act** - Converge sub-resources, launch jobs, tear down on deletion
//! 5. **Status** - Report phase and conditions back to Kubernetes
//!
//! # Submodules
//!
//! - [`instance`] - Per-reconcile driver, see [`reconcile_instance`]
//! - [`phase`] - Pure lifecycle state machine
//! - [`conditions`] - Per-aspect conditions and the aggregate `Ready`
//! - [`provisioner`] - Desired state, idempotent create/update of sub-resources
//! - [`jobs`] - Provisioning and cleanup jobs
//! - [`finalizers`] - Finalizer bookkeeping
//! - [`retry`] - Exponential backoff for transient API errors
//!
//! # Example
//!
//! ```rust,no_run
//! use tenant_operator::context::Context;
//! use tenant_operator::reconcilers::reconcile_instance;
//! use std::sync::Arc;
//!
//! async fn reconcile(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     let action = reconcile_instance(ctx, "acme").await?;
//!     println!("{action:?}");
//!     Ok(())
//! }
//! ```

pub mod conditions;
pub mod finalizers;
pub mod instance;
pub mod jobs;
pub mod phase;
pub mod provisioner;
pub mod retry;

pub use instance::reconcile_instance;

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observedGeneration` is set by the controller after processing a spec.
///
/// # Returns
///
/// * `true` - Spec changed since it was last processed, or it was never processed
/// * `false` - Spec unchanged, or no generation tracking available
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}
