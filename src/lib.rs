// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Tenant Operator - Multi-Tenant Instance Reconciliation for Kubernetes
//!
//! The tenant operator turns a `TenantInstance` custom resource into a fully
//! provisioned, isolated tenant: a dedicated namespace, generated credentials,
//! a Helm release of the tenant application, ingress routing, and one-shot
//! provisioning and cleanup jobs. It reports progress through a phase and a set
//! of per-aspect conditions on the resource status.
//!
//! ## Modules
//!
//! - [`crd`] - `TenantInstance` custom resource, phases and conditions
//! - [`reconcilers`] - Lifecycle state machine and reconciliation driver
//! - [`cluster`] - Typed access to the Kubernetes objects the operator manages
//! - [`release`] - Helm release management
//! - [`context`] - Shared dependencies handed to each reconcile
//! - [`leader`] - Lease-based leader election
//! - [`config`] - Command line and environment configuration
//! - [`metrics`] - Prometheus metrics
//! - [`health`] - Probe and metrics HTTP server
//!
//! ## Example
//!
//! ```rust,no_run
//! use tenant_operator::crd::{TenantInstance, TenantInstanceSpec};
//!
//! let instance = TenantInstance::new(
//!     "acme",
//!     TenantInstanceSpec {
//!         project_name: "acme".to_string(),
//!         ingress_class: None,
//!         ingress_domain: Some("tenants.example.com".to_string()),
//!         release_version: None,
//!         paused: false,
//!     },
//! );
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod health;
pub mod labels;
pub mod leader;
pub mod metrics;
pub mod reconcilers;
pub mod release;
pub mod status_reasons;

#[cfg(test)]
mod cluster_tests;
#[cfg(test)]
mod crd_tests;
#[cfg(test)]
mod errors_tests;
#[cfg(test)]
mod status_reasons_tests;
