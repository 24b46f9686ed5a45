// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide configuration.
//!
//! [`Config`] is parsed once at startup from flags and environment variables and
//! converted into an immutable [`ControllerDefaults`] snapshot that every reconcile
//! reads through an `Arc`.

use crate::constants::{
    DEFAULT_JOB_ACTIVE_DEADLINE_SECS, DEFAULT_JOB_BACKOFF_LIMIT, DEFAULT_LEASE_NAME,
    DEFAULT_NAMESPACE_PREFIX, METRICS_SERVER_PORT,
};
use crate::crd::TenantInstanceSpec;
use clap::Parser;

/// Command-line and environment configuration for the operator.
#[derive(Parser, Debug, Clone)]
#[command(name = "tenant-operator", version, about)]
pub struct Config {
    /// Ingress class used when an instance does not set one
    #[arg(long, env = "INGRESS_CLASS", default_value = "nginx")]
    pub ingress_class: String,

    /// Base domain used when an instance does not set one
    #[arg(long, env = "INGRESS_DOMAIN", default_value = "tenants.local")]
    pub ingress_domain: String,

    /// Chart repository URL for the tenant application release
    #[arg(long, env = "CHART_REPOSITORY", default_value = "oci://registry.local/charts")]
    pub chart_repository: String,

    /// Chart name for the tenant application release
    #[arg(long, env = "CHART_NAME", default_value = "tenant-app")]
    pub chart_name: String,

    /// Chart version used when an instance does not pin one
    #[arg(long, env = "CHART_VERSION", default_value = "0.1.0")]
    pub chart_version: String,

    /// cert-manager cluster issuer; enables TLS on tenant ingresses when set
    #[arg(long, env = "TLS_ISSUER")]
    pub tls_issuer: Option<String>,

    /// Prefix for tenant namespaces
    #[arg(long, env = "NAMESPACE_PREFIX", default_value = DEFAULT_NAMESPACE_PREFIX)]
    pub namespace_prefix: String,

    /// Namespace where provisioning and cleanup jobs run
    #[arg(long, env = "JOB_NAMESPACE", default_value = "tenant-system")]
    pub job_namespace: String,

    /// Container image for provisioning and cleanup jobs
    #[arg(long, env = "JOB_IMAGE", default_value = "registry.local/tenant-jobs:latest")]
    pub job_image: String,

    /// Service account for provisioning and cleanup jobs
    #[arg(long, env = "JOB_SERVICE_ACCOUNT")]
    pub job_service_account: Option<String>,

    #[arg(long, env = "JOB_BACKOFF_LIMIT", default_value_t = DEFAULT_JOB_BACKOFF_LIMIT)]
    pub job_backoff_limit: i32,

    #[arg(long, env = "JOB_ACTIVE_DEADLINE_SECONDS", default_value_t = DEFAULT_JOB_ACTIVE_DEADLINE_SECS)]
    pub job_active_deadline_seconds: i64,

    /// Enable Lease-based leader election
    #[arg(long, env = "LEADER_ELECTION", default_value_t = true, action = clap::ArgAction::Set)]
    pub leader_election: bool,

    #[arg(long, env = "LEASE_NAME", default_value = DEFAULT_LEASE_NAME)]
    pub lease_name: String,

    #[arg(long, env = "LEASE_NAMESPACE", default_value = "tenant-system")]
    pub lease_namespace: String,

    /// Leader election identity, falls back to the hostname
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Path to the helm binary
    #[arg(long, env = "HELM_BINARY", default_value = "helm")]
    pub helm_binary: String,
}

impl Config {
    /// Immutable snapshot of the settings reconciles depend on.
    #[must_use]
    pub fn defaults(&self) -> ControllerDefaults {
        ControllerDefaults {
            ingress_class: self.ingress_class.clone(),
            ingress_domain: self.ingress_domain.clone(),
            chart_repository: self.chart_repository.clone(),
            chart_name: self.chart_name.clone(),
            chart_version: self.chart_version.clone(),
            tls_issuer: self.tls_issuer.clone().filter(|s| !s.is_empty()),
            namespace_prefix: self.namespace_prefix.clone(),
            job_namespace: self.job_namespace.clone(),
            job_image: self.job_image.clone(),
            job_service_account: self.job_service_account.clone().filter(|s| !s.is_empty()),
            job_backoff_limit: self.job_backoff_limit,
            job_active_deadline_seconds: self.job_active_deadline_seconds,
        }
    }

    /// Leader election identity: `POD_NAME`, then `HOSTNAME`, then a fixed fallback.
    #[must_use]
    pub fn identity(&self) -> String {
        self.pod_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "tenant-operator".to_string())
    }
}

/// Controller-wide provisioning defaults, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDefaults {
    pub ingress_class: String,
    pub ingress_domain: String,
    pub chart_repository: String,
    pub chart_name: String,
    pub chart_version: String,
    pub tls_issuer: Option<String>,
    pub namespace_prefix: String,
    pub job_namespace: String,
    pub job_image: String,
    pub job_service_account: Option<String>,
    pub job_backoff_limit: i32,
    pub job_active_deadline_seconds: i64,
}

impl Default for ControllerDefaults {
    fn default() -> Self {
        Self {
            ingress_class: "nginx".to_string(),
            ingress_domain: "tenants.local".to_string(),
            chart_repository: "oci://registry.local/charts".to_string(),
            chart_name: "tenant-app".to_string(),
            chart_version: "0.1.0".to_string(),
            tls_issuer: None,
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            job_namespace: "tenant-system".to_string(),
            job_image: "registry.local/tenant-jobs:latest".to_string(),
            job_service_account: None,
            job_backoff_limit: DEFAULT_JOB_BACKOFF_LIMIT,
            job_active_deadline_seconds: DEFAULT_JOB_ACTIVE_DEADLINE_SECS,
        }
    }
}

impl ControllerDefaults {
    #[must_use]
    pub fn ingress_class_for<'a>(&'a self, spec: &'a TenantInstanceSpec) -> &'a str {
        spec.ingress_class
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.ingress_class)
    }

    #[must_use]
    pub fn ingress_domain_for<'a>(&'a self, spec: &'a TenantInstanceSpec) -> &'a str {
        spec.ingress_domain
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.ingress_domain)
    }

    #[must_use]
    pub fn chart_version_for<'a>(&'a self, spec: &'a TenantInstanceSpec) -> &'a str {
        spec.release_version
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.chart_version)
    }

    /// Namespace provisioned for a project.
    #[must_use]
    pub fn namespace_for(&self, project: &str) -> String {
        format!("{}{project}", self.namespace_prefix)
    }

    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.tls_issuer.is_some()
    }
}
