// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader election using Kubernetes Leases.
//!
//! Only the replica holding the lease runs the controller. [`LeaderState`] is the shared
//! flag reconciles consult before every write; when leader election is disabled it is
//! permanently true.

use crate::metrics;
use kube::Client;
use kube_lease_manager::{LeaseManagerBuilder, LeaseManagerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LeaderError {
    #[error("lease manager error: {0}")]
    Lease(#[from] LeaseManagerError),

    #[error("lease watch channel closed")]
    ChannelClosed,
}

/// Process-wide "am I the leader" flag.
#[derive(Clone, Debug)]
pub struct LeaderState {
    flag: Arc<AtomicBool>,
}

impl LeaderState {
    /// A state that is always leader, for single-replica deployments and tests.
    #[must_use]
    pub fn always() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn set(&self, leader: bool) {
        self.flag.store(leader, Ordering::SeqCst);
    }
}

/// Lease coordinates and timing.
#[derive(Clone, Debug)]
pub struct LeaseSettings {
    pub name: String,
    pub namespace: String,
    pub identity: String,
    pub duration_secs: u64,
    pub grace_secs: u64,
}

/// A running lease watcher.
pub struct LeaderElection {
    state: LeaderState,
    channel: watch::Receiver<bool>,
    task: JoinHandle<()>,
    identity: String,
}

impl LeaderElection {
    /// Start contending for the lease. Leadership is not held until
    /// [`LeaderElection::wait_until_leader`] returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease manager cannot be built.
    pub async fn start(client: Client, settings: &LeaseSettings) -> Result<Self, LeaderError> {
        info!(
            lease = %settings.name,
            namespace = %settings.namespace,
            identity = %settings.identity,
            "Starting leader election"
        );

        let manager = LeaseManagerBuilder::new(client, &settings.name)
            .with_namespace(&settings.namespace)
            .with_identity(&settings.identity)
            .with_duration(settings.duration_secs)
            .with_grace(settings.grace_secs)
            .build()
            .await?;

        let (channel, handle) = manager.watch().await;
        let task = tokio::spawn(async move {
            match handle.await {
                Ok(Ok(_)) => debug!("Lease manager stopped and released the lease"),
                Ok(Err(e)) => warn!(error = %e, "Lease manager stopped with an error"),
                Err(e) => warn!(error = %e, "Lease manager task panicked"),
            }
        });

        Ok(Self {
            state: LeaderState::new(false),
            channel,
            task,
            identity: settings.identity.clone(),
        })
    }

    #[must_use]
    pub fn state(&self) -> LeaderState {
        self.state.clone()
    }

    /// Block until this replica holds the lease.
    ///
    /// # Errors
    ///
    /// Returns [`LeaderError::ChannelClosed`] if the lease manager stops.
    pub async fn wait_until_leader(&mut self) -> Result<(), LeaderError> {
        while !*self.channel.borrow_and_update() {
            debug!(identity = %self.identity, "Waiting for leadership");
            self.channel
                .changed()
                .await
                .map_err(|_| LeaderError::ChannelClosed)?;
        }
        self.state.set(true);
        metrics::record_leader_elected(&self.identity);
        info!(identity = %self.identity, "Acquired leadership");
        Ok(())
    }

    /// Resolve once leadership is lost or the lease manager stops.
    pub async fn lost(&mut self) {
        loop {
            if self.channel.changed().await.is_err() {
                break;
            }
            if !*self.channel.borrow_and_update() {
                break;
            }
        }
        self.state.set(false);
        metrics::record_leader_lost(&self.identity);
        warn!(identity = %self.identity, "Lost leadership");
    }

    /// Stop contending and release the lease if held.
    pub async fn release(self) {
        self.state.set(false);
        drop(self.channel);
        let _ = self.task.await;
    }
}
