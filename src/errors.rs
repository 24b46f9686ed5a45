// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the instance lifecycle.
//!
//! [`ProvisionError`] names the sub-resource that failed so it can be folded into
//! the matching condition. [`Error`] is what a reconcile returns to the controller
//! runtime; everything user-visible is written to status before it gets that far.

use crate::cluster::ClusterError;
use crate::release::ReleaseError;
use std::fmt;

/// The cluster object a provisioning step was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    Namespace,
    Secrets,
    HelmRelease,
    Ingress,
    Job,
    Finalizer,
}

impl SubResource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubResource::Namespace => "Namespace",
            SubResource::Secrets => "Secrets",
            SubResource::HelmRelease => "HelmRelease",
            SubResource::Ingress => "Ingress",
            SubResource::Job => "Job",
            SubResource::Finalizer => "Finalizer",
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionFailure {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Release(#[from] ReleaseError),
}

/// A provisioning step failed on a specific sub-resource.
#[derive(Debug, thiserror::Error)]
#[error("{resource}: {source}")]
pub struct ProvisionError {
    pub resource: SubResource,
    #[source]
    pub source: ProvisionFailure,
}

impl ProvisionError {
    #[must_use]
    pub fn cluster(resource: SubResource, err: ClusterError) -> Self {
        Self {
            resource,
            source: ProvisionFailure::Cluster(err),
        }
    }

    #[must_use]
    pub fn release(resource: SubResource, err: ReleaseError) -> Self {
        Self {
            resource,
            source: ProvisionFailure::Release(err),
        }
    }

    /// Transient failures are retried by requeueing instead of failing the instance.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match &self.source {
            ProvisionFailure::Cluster(e) => e.is_transient(),
            ProvisionFailure::Release(e) => e.is_transient(),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(&self.source, ProvisionFailure::Cluster(e) if e.is_conflict())
    }
}

/// Error returned from a reconcile to the controller runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cluster API error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("status write conflicted {attempts} times")]
    ConflictRetriesExhausted { attempts: u32 },

    /// Leadership was lost mid-reconcile; no further writes were made.
    #[error("leadership lost")]
    LeadershipLost,
}

impl Error {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Cluster(e) => e.is_conflict(),
            Error::Provision(e) => e.is_conflict(),
            Error::ConflictRetriesExhausted { .. } | Error::LeadershipLost => false,
        }
    }

    /// Category label for the errors metric.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Cluster(e) if e.is_conflict() => "conflict",
            Error::Cluster(_) => "cluster_error",
            Error::Provision(e) => match e.source {
                ProvisionFailure::Cluster(_) => "provision_error",
                ProvisionFailure::Release(_) => "release_error",
            },
            Error::ConflictRetriesExhausted { .. } => "conflict",
            Error::LeadershipLost => "leadership_lost",
        }
    }
}
