// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the instance controller.
//!
//! The controller hands every reconcile an `Arc<Context>` that contains:
//! - the orchestration API capability
//! - the packaged-application release capability
//! - the immutable controller defaults
//! - the leader election flag
//!
//! Capabilities are trait objects so tests can swap in in-memory fakes.

use crate::cluster::{ClusterApi, KubeClusterApi};
use crate::config::ControllerDefaults;
use crate::leader::LeaderState;
use crate::release::{HelmCli, ReleaseManager};
use kube::Client;
use std::sync::Arc;

/// Shared context passed to every reconcile.
#[derive(Clone)]
pub struct Context {
    /// Orchestration API access
    pub cluster: Arc<dyn ClusterApi>,

    /// Release install/upgrade/uninstall
    pub releases: Arc<dyn ReleaseManager>,

    /// Controller-wide provisioning defaults
    pub defaults: Arc<ControllerDefaults>,

    /// Whether this replica currently holds the leader lease
    pub leader: LeaderState,
}

impl Context {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        releases: Arc<dyn ReleaseManager>,
        defaults: ControllerDefaults,
        leader: LeaderState,
    ) -> Self {
        Self {
            cluster,
            releases,
            defaults: Arc::new(defaults),
            leader,
        }
    }

    /// Context over a live cluster and the `helm` binary.
    #[must_use]
    pub fn from_client(
        client: Client,
        helm_binary: &str,
        defaults: ControllerDefaults,
        leader: LeaderState,
    ) -> Self {
        Self::new(
            Arc::new(KubeClusterApi::new(client)),
            Arc::new(HelmCli::new(helm_binary)),
            defaults,
            leader,
        )
    }
}
