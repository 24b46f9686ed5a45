// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory cluster and release fakes for scenario tests.
//!
//! `FakeCluster` keeps every object in a map and hands out increasing
//! resourceVersions, rejecting writes that carry a stale one. `FakeReleases`
//! records releases the way `helm` would report them back.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::jiff::Timestamp;
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Resource;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tenant_operator::cluster::{status_patch, ClusterApi, ClusterError};
use tenant_operator::config::ControllerDefaults;
use tenant_operator::context::Context;
use tenant_operator::crd::{TenantInstance, TenantInstanceSpec, TenantInstanceStatus};
use tenant_operator::leader::LeaderState;
use tenant_operator::release::{ReleaseError, ReleaseInfo, ReleaseManager, ReleaseRequest};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// JSON merge patch (RFC 7386): objects merge key by key, `null` removes a key,
/// anything else replaces the target.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in patch {
            if value.is_null() {
                fields.remove(key);
            } else {
                merge_patch(fields.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn not_found(kind: &str, name: &str) -> ClusterError {
    ClusterError::Api {
        code: 404,
        reason: "NotFound".to_string(),
        message: format!("{kind} \"{name}\" not found"),
    }
}

#[derive(Default)]
struct ClusterState {
    instances: BTreeMap<String, TenantInstance>,
    namespaces: BTreeMap<String, Namespace>,
    secrets: BTreeMap<Key, Secret>,
    ingresses: BTreeMap<Key, Ingress>,
    jobs: BTreeMap<Key, Job>,
    next_version: u64,
    writes: usize,
    injected_conflicts: u32,
    /// Instance name and phase of every status write, in order.
    status_writes: Vec<(String, String)>,
}

impl ClusterState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.writes += 1;
        self.next_version.to_string()
    }

    fn take_conflict(&mut self) -> bool {
        if self.injected_conflicts > 0 {
            self.injected_conflicts -= 1;
            true
        } else {
            false
        }
    }

    fn instance_for_write(
        &mut self,
        name: &str,
        resource_version: &str,
    ) -> Result<&mut TenantInstance, ClusterError> {
        if self.take_conflict() {
            return Err(ClusterError::Conflict(format!("injected conflict on {name}")));
        }
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| not_found("tenantinstances", name))?;
        if instance.metadata.resource_version.as_deref() != Some(resource_version) {
            return Err(ClusterError::Conflict(format!(
                "the object has been modified; please apply your changes to the latest version of {name}"
            )));
        }
        Ok(instance)
    }
}

/// In-memory [`ClusterApi`].
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    fn with<T>(&self, f: impl FnOnce(&mut ClusterState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Store a new instance at generation 1.
    pub fn add_instance(&self, instance: TenantInstance) {
        self.with(|s| {
            let mut instance = instance;
            let name = instance.metadata.name.clone().unwrap();
            instance.metadata.generation = Some(1);
            instance.metadata.uid = Some(format!("uid-{name}"));
            instance.metadata.resource_version = Some(s.bump());
            s.instances.insert(name, instance);
        });
    }

    pub fn instance(&self, name: &str) -> Option<TenantInstance> {
        self.with(|s| s.instances.get(name).cloned())
    }

    pub fn status(&self, name: &str) -> TenantInstanceStatus {
        self.instance(name)
            .and_then(|i| i.status)
            .unwrap_or_default()
    }

    /// Change the spec the way a user would: generation and resourceVersion move.
    pub fn update_spec(&self, name: &str, f: impl FnOnce(&mut TenantInstanceSpec)) {
        self.with(|s| {
            let version = s.bump();
            let instance = s.instances.get_mut(name).unwrap();
            f(&mut instance.spec);
            instance.metadata.generation = instance.metadata.generation.map(|g| g + 1);
            instance.metadata.resource_version = Some(version);
        });
    }

    /// Edit status out of band, e.g. to age a failure timestamp.
    pub fn edit_status(&self, name: &str, f: impl FnOnce(&mut TenantInstanceStatus)) {
        self.with(|s| {
            let version = s.bump();
            let instance = s.instances.get_mut(name).unwrap();
            f(instance.status.get_or_insert_with(Default::default));
            instance.metadata.resource_version = Some(version);
        });
    }

    /// Request deletion. Without finalizers the object goes away immediately.
    pub fn request_deletion(&self, name: &str) {
        self.with(|s| {
            let version = s.bump();
            let finalized = match s.instances.get(name) {
                Some(instance) => instance.meta().finalizers.as_ref().is_none_or(Vec::is_empty),
                None => return,
            };
            if finalized {
                s.instances.remove(name);
            } else if let Some(instance) = s.instances.get_mut(name) {
                instance.metadata.deletion_timestamp = Some(Time(Timestamp::now()));
                instance.metadata.resource_version = Some(version);
            }
        });
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.with(|s| s.namespaces.get(name).cloned())
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.with(|s| s.secrets.get(&key(namespace, name)).cloned())
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.with(|s| s.ingresses.get(&key(namespace, name)).cloned())
    }

    pub fn put_ingress(&self, namespace: &str, ingress: Ingress) {
        self.with(|s| {
            let name = ingress.metadata.name.clone().unwrap();
            s.ingresses.insert(key(namespace, &name), ingress);
        });
    }

    pub fn job_names(&self) -> Vec<String> {
        self.with(|s| s.jobs.keys().map(|(_, name)| name.clone()).collect())
    }

    pub fn set_job_status(&self, namespace: &str, name: &str, status: JobStatus) {
        self.with(|s| {
            let job = s.jobs.get_mut(&key(namespace, name)).unwrap();
            job.status = Some(status);
        });
    }

    pub fn complete_job(&self, namespace: &str, name: &str) {
        self.set_job_status(
            namespace,
            name,
            JobStatus {
                succeeded: Some(1),
                ..Default::default()
            },
        );
    }

    pub fn fail_job(&self, namespace: &str, name: &str, reason: &str, message: &str) {
        self.set_job_status(
            namespace,
            name,
            JobStatus {
                failed: Some(3),
                conditions: Some(vec![JobCondition {
                    type_: "Failed".to_string(),
                    status: "True".to_string(),
                    reason: Some(reason.to_string()),
                    message: Some(message.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        );
    }

    pub fn delete_job(&self, namespace: &str, name: &str) {
        self.with(|s| s.jobs.remove(&key(namespace, name)));
    }

    /// Number of mutating calls served so far.
    pub fn writes(&self) -> usize {
        self.with(|s| s.writes)
    }

    pub fn status_writes(&self) -> Vec<(String, String)> {
        self.with(|s| s.status_writes.clone())
    }

    /// Make the next `count` instance writes fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.with(|s| s.injected_conflicts = count);
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_instance(&self, name: &str) -> Result<Option<TenantInstance>, ClusterError> {
        Ok(self.instance(name))
    }

    async fn patch_instance_status(
        &self,
        name: &str,
        resource_version: &str,
        status: &TenantInstanceStatus,
    ) -> Result<TenantInstance, ClusterError> {
        let patch = status_patch(resource_version, status)?;
        self.with(|s| {
            s.instance_for_write(name, resource_version)?;
            let version = s.bump();
            s.status_writes
                .push((name.to_string(), status.phase.as_str().to_string()));
            let instance = s
                .instances
                .get_mut(name)
                .ok_or_else(|| not_found("tenantinstances", name))?;
            let mut stored = serde_json::to_value(&instance.status)?;
            merge_patch(&mut stored, &patch["status"]);
            instance.status = Some(serde_json::from_value(stored)?);
            instance.metadata.resource_version = Some(version);
            Ok(instance.clone())
        })
    }

    async fn set_instance_finalizers(
        &self,
        name: &str,
        resource_version: &str,
        finalizers: &[String],
    ) -> Result<TenantInstance, ClusterError> {
        self.with(|s| {
            s.instance_for_write(name, resource_version)?;
            let version = s.bump();
            let instance = s
                .instances
                .get_mut(name)
                .ok_or_else(|| not_found("tenantinstances", name))?;
            instance.metadata.finalizers = Some(finalizers.to_vec());
            instance.metadata.resource_version = Some(version);
            let updated = instance.clone();
            if finalizers.is_empty() && updated.metadata.deletion_timestamp.is_some() {
                s.instances.remove(name);
            }
            Ok(updated)
        })
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        Ok(self.namespace(name))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        self.with(|s| {
            let name = namespace.metadata.name.clone().unwrap_or_default();
            if s.namespaces.contains_key(&name) {
                return Err(ClusterError::AlreadyExists(name));
            }
            let mut created = namespace.clone();
            created.metadata.resource_version = Some(s.bump());
            s.namespaces.insert(name, created.clone());
            Ok(created)
        })
    }

    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        self.with(|s| {
            let name = namespace.metadata.name.clone().unwrap_or_default();
            if !s.namespaces.contains_key(&name) {
                return Err(not_found("namespaces", &name));
            }
            let mut replaced = namespace.clone();
            replaced.metadata.resource_version = Some(s.bump());
            s.namespaces.insert(name, replaced.clone());
            Ok(replaced)
        })
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, ClusterError> {
        self.with(|s| {
            let existed = s.namespaces.remove(name).is_some();
            if existed {
                s.writes += 1;
                s.secrets.retain(|(ns, _), _| ns != name);
                s.ingresses.retain(|(ns, _), _| ns != name);
            }
            Ok(existed)
        })
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        self.with(|s| {
            let name = secret.metadata.name.clone().unwrap_or_default();
            if !s.namespaces.contains_key(namespace) {
                return Err(not_found("namespaces", namespace));
            }
            if s.secrets.contains_key(&key(namespace, &name)) {
                return Err(ClusterError::AlreadyExists(name));
            }
            let mut created = secret.clone();
            created.metadata.resource_version = Some(s.bump());
            s.secrets.insert(key(namespace, &name), created.clone());
            Ok(created)
        })
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        self.with(|s| {
            let name = secret.metadata.name.clone().unwrap_or_default();
            if !s.secrets.contains_key(&key(namespace, &name)) {
                return Err(not_found("secrets", &name));
            }
            let mut replaced = secret.clone();
            replaced.metadata.resource_version = Some(s.bump());
            s.secrets.insert(key(namespace, &name), replaced.clone());
            Ok(replaced)
        })
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, ClusterError> {
        Ok(self.ingress(namespace, name))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        self.with(|s| {
            let name = ingress.metadata.name.clone().unwrap_or_default();
            if s.ingresses.contains_key(&key(namespace, &name)) {
                return Err(ClusterError::AlreadyExists(name));
            }
            let mut created = ingress.clone();
            created.metadata.resource_version = Some(s.bump());
            s.ingresses.insert(key(namespace, &name), created.clone());
            Ok(created)
        })
    }

    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        self.with(|s| {
            let name = ingress.metadata.name.clone().unwrap_or_default();
            if !s.ingresses.contains_key(&key(namespace, &name)) {
                return Err(not_found("ingresses", &name));
            }
            let mut replaced = ingress.clone();
            replaced.metadata.resource_version = Some(s.bump());
            s.ingresses.insert(key(namespace, &name), replaced.clone());
            Ok(replaced)
        })
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        Ok(self.with(|s| s.jobs.get(&key(namespace, name)).cloned()))
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        self.with(|s| {
            let name = job.metadata.name.clone().unwrap_or_default();
            if s.jobs.contains_key(&key(namespace, &name)) {
                return Err(ClusterError::AlreadyExists(name));
            }
            let mut created = job.clone();
            created.metadata.resource_version = Some(s.bump());
            s.jobs.insert(key(namespace, &name), created.clone());
            Ok(created)
        })
    }
}

/// In-memory [`ReleaseManager`].
#[derive(Default)]
pub struct FakeReleases {
    releases: Mutex<BTreeMap<Key, ReleaseInfo>>,
    failure: Mutex<Option<String>>,
    installs: Mutex<usize>,
}

impl FakeReleases {
    pub fn release(&self, namespace: &str, name: &str) -> Option<ReleaseInfo> {
        self.releases.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Make every install fail with `stderr` until cleared with `None`.
    pub fn fail_installs(&self, stderr: Option<&str>) {
        *self.failure.lock().unwrap() = stderr.map(str::to_string);
    }

    pub fn installs(&self) -> usize {
        *self.installs.lock().unwrap()
    }
}

#[async_trait]
impl ReleaseManager for FakeReleases {
    async fn status(&self, namespace: &str, name: &str) -> Result<Option<ReleaseInfo>, ReleaseError> {
        Ok(self.release(namespace, name))
    }

    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseInfo, ReleaseError> {
        if let Some(stderr) = self.failure.lock().unwrap().clone() {
            return Err(ReleaseError::CommandFailed {
                command: "helm upgrade --install".to_string(),
                code: Some(1),
                stderr,
            });
        }

        let mut releases = self.releases.lock().unwrap();
        let revision = releases
            .get(&key(&request.namespace, &request.name))
            .map_or(1, |r| r.revision + 1);
        let info = ReleaseInfo {
            name: request.name.clone(),
            namespace: request.namespace.clone(),
            revision,
            status: "deployed".to_string(),
            chart_name: request.chart_name.clone(),
            chart_version: request.chart_version.clone(),
            values_digest: Some(request.values_digest()),
        };
        releases.insert(key(&request.namespace, &request.name), info.clone());
        *self.installs.lock().unwrap() += 1;
        Ok(info)
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> Result<(), ReleaseError> {
        self.releases.lock().unwrap().remove(&key(namespace, name));
        Ok(())
    }
}

/// Fakes plus a context wired to them.
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub releases: Arc<FakeReleases>,
    pub ctx: Arc<Context>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_leader(LeaderState::always())
    }

    pub fn with_leader(leader: LeaderState) -> Self {
        let cluster = Arc::new(FakeCluster::default());
        let releases = Arc::new(FakeReleases::default());
        let ctx = Arc::new(Context::new(
            cluster.clone(),
            releases.clone(),
            ControllerDefaults::default(),
            leader,
        ));
        Self {
            cluster,
            releases,
            ctx,
        }
    }

    pub fn job_namespace(&self) -> String {
        self.ctx.defaults.job_namespace.clone()
    }
}

pub fn instance(name: &str, project: &str) -> TenantInstance {
    TenantInstance::new(
        name,
        TenantInstanceSpec {
            project_name: project.to_string(),
            ingress_class: None,
            ingress_domain: None,
            release_version: None,
            paused: false,
        },
    )
}
