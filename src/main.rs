// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tenant_operator::{
    config::Config,
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS, ERROR_REQUEUE_DURATION_SECS,
        KIND_TENANT_INSTANCE, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::TenantInstance,
    errors::Error,
    health::{run_health_server, HealthState},
    labels::{K8S_MANAGED_BY, MANAGED_BY_TENANT_OPERATOR},
    leader::{LeaderElection, LeaderState, LeaseSettings},
    metrics,
    reconcilers::reconcile_instance,
};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("tenant-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let config = Config::parse();
    info!("Starting tenant instance controller");
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    // Probes and metrics are served even while waiting for leadership
    let health = Arc::new(HealthState::new());
    {
        let health = health.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health, port).await {
                error!(error = %e, "Metrics and health server exited");
            }
        });
    }

    let (leader, election) = if config.leader_election {
        let settings = LeaseSettings {
            name: config.lease_name.clone(),
            namespace: config.lease_namespace.clone(),
            identity: config.identity(),
            duration_secs: DEFAULT_LEASE_DURATION_SECS,
            grace_secs: DEFAULT_LEASE_GRACE_SECS,
        };
        let mut election = LeaderElection::start(client.clone(), &settings).await?;
        let acquired = tokio::select! {
            result = election.wait_until_leader() => Some(result),
            () = shutdown_signal() => None,
        };
        match acquired {
            Some(result) => result?,
            None => {
                info!("Received shutdown signal before acquiring leadership");
                election.release().await;
                return Ok(());
            }
        }
        (election.state(), Some(election))
    } else {
        info!("Leader election disabled, running as the only replica");
        (LeaderState::always(), None)
    };

    let leadership_lost = Arc::new(AtomicBool::new(false));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(watch_for_stop(election, leadership_lost.clone(), stop_tx));

    let ctx = Arc::new(Context::from_client(
        client.clone(),
        &config.helm_binary,
        config.defaults(),
        leader,
    ));

    health.set_ready(true);
    run_controller(client, &config.job_namespace, ctx, stop_rx).await;
    health.set_ready(false);

    if leadership_lost.load(Ordering::SeqCst) {
        anyhow::bail!("leadership lost, exiting so another replica can take over");
    }
    info!("Controller stopped");
    Ok(())
}

/// Run the `TenantInstance` controller until `stop` fires.
async fn run_controller(
    client: Client,
    job_namespace: &str,
    ctx: Arc<Context>,
    stop: oneshot::Receiver<()>,
) {
    info!(job_namespace, "Starting TenantInstance controller");

    let instances = Api::<TenantInstance>::all(client.clone());
    let jobs = Api::<Job>::namespaced(client, job_namespace);
    let job_selector = format!("{K8S_MANAGED_BY}={MANAGED_BY_TENANT_OPERATOR}");

    Controller::new(instances, watcher::Config::default())
        .owns(jobs, watcher::Config::default().labels(&job_selector))
        .graceful_shutdown_on(async move {
            let _ = stop.await;
        })
        .run(reconcile_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Resolve `stop` on SIGTERM/SIGINT or when leadership is lost, then release the lease.
async fn watch_for_stop(
    election: Option<LeaderElection>,
    leadership_lost: Arc<AtomicBool>,
    stop: oneshot::Sender<()>,
) {
    match election {
        Some(mut election) => {
            tokio::select! {
                () = shutdown_signal() => info!("Received shutdown signal, stopping controller"),
                () = election.lost() => {
                    leadership_lost.store(true, Ordering::SeqCst);
                    warn!("Leadership lost, stopping controller");
                }
            }
            let _ = stop.send(());
            election.release().await;
        }
        None => {
            shutdown_signal().await;
            info!("Received shutdown signal, stopping controller");
            let _ = stop.send(());
        }
    }
}

/// Reconcile wrapper for `TenantInstance`
async fn reconcile_wrapper(
    instance: Arc<TenantInstance>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = instance.name_any();
    debug!(instance = %name, "Reconcile wrapper called for TenantInstance");

    match reconcile_instance(ctx, &name).await {
        Ok(action) => {
            debug!(instance = %name, ?action, "Reconciled TenantInstance");
            Ok(action)
        }
        Err(e) => {
            error!(instance = %name, error = %e, "Failed to reconcile TenantInstance");
            Err(e)
        }
    }
}

/// Error policy: requeue after a fixed delay
fn error_policy(instance: Arc<TenantInstance>, err: &Error, _ctx: Arc<Context>) -> Action {
    warn!(
        instance = %instance.name_any(),
        error = %err,
        "Requeueing TenantInstance after error"
    );
    metrics::record_reconciliation_requeue(KIND_TENANT_INSTANCE, "error");
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Wait for SIGTERM or SIGINT.
///
/// A handler that cannot be installed never resolves, leaving the other signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
