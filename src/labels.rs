// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and tenancy-specific labels/annotations
//! to ensure consistency across all resources created by the controller.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "tenant-namespace")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` on every tenant object
pub const PART_OF_TENANCY: &str = "tenancy-platform";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_TENANT_OPERATOR: &str = "tenant-operator";

/// Component value for tenant namespaces
pub const COMPONENT_NAMESPACE: &str = "tenant-namespace";

/// Component value for credential secrets
pub const COMPONENT_CREDENTIALS: &str = "tenant-credentials";

/// Component value for ingress routes
pub const COMPONENT_INGRESS: &str = "tenant-ingress";

/// Component value for provisioning and cleanup jobs
pub const COMPONENT_JOB: &str = "tenant-job";

// ============================================================================
// Tenancy-Specific Labels
// ============================================================================

/// Label naming the `TenantInstance` that owns an object
pub const TENANCY_INSTANCE_LABEL: &str = "tenancy.platform.io/instance";

/// Label naming the job kind (`provision` or `cleanup`)
pub const TENANCY_JOB_KIND_LABEL: &str = "tenancy.platform.io/job-kind";

// ============================================================================
// Tenancy-Specific Annotations
// ============================================================================

/// Annotation requesting a certificate for the ingress from the named cluster issuer
pub const CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `TenantInstance` resources
pub const FINALIZER_TENANT_INSTANCE: &str = "tenancy.platform.io/tenantinstance-finalizer";

/// Standard labels for an object owned by the named instance.
#[must_use]
pub fn instance_labels(project: &str, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_NAME.to_string(), project.to_string()),
        (K8S_INSTANCE.to_string(), project.to_string()),
        (K8S_COMPONENT.to_string(), component.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_TENANCY.to_string()),
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_TENANT_OPERATOR.to_string()),
        (TENANCY_INSTANCE_LABEL.to_string(), project.to_string()),
    ])
}

/// True when every key/value in `expected` is present in `actual`.
///
/// Extra labels added by other tooling are tolerated.
#[must_use]
pub fn labels_contain(
    actual: Option<&BTreeMap<String, String>>,
    expected: &BTreeMap<String, String>,
) -> bool {
    let Some(actual) = actual else {
        return expected.is_empty();
    };
    expected.iter().all(|(k, v)| actual.get(k) == Some(v))
}
