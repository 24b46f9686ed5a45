// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `TenantInstance` resources.
//!
//! The finalizer holds an instance in place until its cleanup job has succeeded.
//! Both operations are idempotent and carry the instance's resourceVersion, so a
//! concurrent writer surfaces as a conflict instead of a lost update.

use crate::cluster::{ClusterApi, ClusterError};
use crate::crd::TenantInstance;
use crate::labels::FINALIZER_TENANT_INSTANCE;
use kube::ResourceExt;
use tracing::info;

/// True if the instance carries the controller's finalizer.
#[must_use]
pub fn has_finalizer(instance: &TenantInstance) -> bool {
    instance
        .finalizers()
        .iter()
        .any(|f| f == FINALIZER_TENANT_INSTANCE)
}

/// Add the finalizer if missing. Returns the updated instance.
///
/// # Errors
///
/// Returns an error if the patch fails, including a conflict when the instance
/// changed since it was read.
pub async fn ensure_finalizer(
    cluster: &dyn ClusterApi,
    instance: &TenantInstance,
) -> Result<TenantInstance, ClusterError> {
    if has_finalizer(instance) {
        return Ok(instance.clone());
    }

    let name = instance.name_any();
    info!("Adding finalizer {} to TenantInstance {}", FINALIZER_TENANT_INSTANCE, name);

    let mut finalizers = instance.finalizers().to_vec();
    finalizers.push(FINALIZER_TENANT_INSTANCE.to_string());

    cluster
        .set_instance_finalizers(
            &name,
            &instance.resource_version().unwrap_or_default(),
            &finalizers,
        )
        .await
}

/// Remove the finalizer if present, allowing the platform to delete the instance.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn remove_finalizer(
    cluster: &dyn ClusterApi,
    instance: &TenantInstance,
) -> Result<(), ClusterError> {
    if !has_finalizer(instance) {
        return Ok(());
    }

    let name = instance.name_any();
    info!("Removing finalizer {} from TenantInstance {}", FINALIZER_TENANT_INSTANCE, name);

    let finalizers: Vec<String> = instance
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER_TENANT_INSTANCE)
        .cloned()
        .collect();

    cluster
        .set_instance_finalizers(
            &name,
            &instance.resource_version().unwrap_or_default(),
            &finalizers,
        )
        .await?;

    info!("Successfully removed finalizer from TenantInstance {}", name);
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
