// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource provisioning for tenant instances.
//!
//! The provisioner realizes a [`DesiredState`] as four cluster objects:
//!
//! 1. **Namespace** `<prefix><project>`
//! 2. **Secret** `<project>-credentials` holding generated credentials
//! 3. **Release** `<project>` of the tenant application chart
//! 4. **Ingress** `<project>` routing the admin UI and API hosts
//!
//! Each object is planned by a pure function of desired and observed state that
//! returns an [`ObjectAction`], and only then applied. Running [`converge`] twice
//! with the same desired state yields [`ObjectAction::Unchanged`] for every object
//! the second time.
//!
//! The provisioner never touches instance status. It returns [`Observations`] and
//! typed [`ProvisionError`]s for the reconciler to fold into conditions.

use crate::cluster::ClusterError;
use crate::config::ControllerDefaults;
use crate::constants::{
    API_HOST_SUFFIX, CREDENTIALS_SECRET_SUFFIX, DEFAULT_ADMIN_USERNAME, GENERATED_SECRET_BYTES,
    RELEASE_SERVICE_PORT,
};
use crate::context::Context;
use crate::crd::TenantInstance;
use crate::errors::{ProvisionError, SubResource};
use crate::labels::{
    instance_labels, labels_contain, CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION,
    COMPONENT_CREDENTIALS, COMPONENT_INGRESS, COMPONENT_NAMESPACE,
};
use crate::metrics;
use crate::reconcilers::conditions::{AspectObservation, Observations};
use crate::release::{ReleaseInfo, ReleaseRequest};
use crate::status_reasons::{
    REASON_INGRESS_DRIFTED, REASON_INGRESS_MISSING, REASON_NAMESPACE_MISSING,
    REASON_NAMESPACE_TERMINATING, REASON_OBSERVATION_FAILED, REASON_READY,
    REASON_RELEASE_MISSING, REASON_RELEASE_NOT_DEPLOYED, REASON_RELEASE_OUTDATED,
    REASON_SECRET_INCOMPLETE, REASON_SECRET_MISSING,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Secret key holding the project name.
pub const SECRET_KEY_PROJECT_NAME: &str = "project-name";
/// Secret key holding the admin username.
pub const SECRET_KEY_ADMIN_USERNAME: &str = "admin-username";
pub const SECRET_KEY_ADMIN_PASSWORD: &str = "admin-password";
pub const SECRET_KEY_API_KEY: &str = "api-key";
pub const SECRET_KEY_DATABASE_PASSWORD: &str = "database-password";

/// Keys generated once and preserved thereafter.
pub const GENERATED_SECRET_KEYS: [&str; 3] = [
    SECRET_KEY_ADMIN_PASSWORD,
    SECRET_KEY_API_KEY,
    SECRET_KEY_DATABASE_PASSWORD,
];

/// Everything the provisioner derives from an instance and the controller defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredState {
    pub instance_name: String,
    pub project: String,
    pub namespace: String,
    pub release_name: String,
    pub secret_name: String,
    pub ingress_name: String,
    pub ingress_class: String,
    pub ingress_domain: String,
    pub admin_host: String,
    pub api_host: String,
    pub tls_issuer: Option<String>,
    pub chart_version: String,
}

impl DesiredState {
    #[must_use]
    pub fn new(instance: &TenantInstance, defaults: &ControllerDefaults) -> Self {
        let project = instance.spec.project_name.clone();
        let domain = defaults.ingress_domain_for(&instance.spec).to_string();

        Self {
            instance_name: instance.name_any(),
            namespace: defaults.namespace_for(&project),
            release_name: project.clone(),
            secret_name: format!("{project}{CREDENTIALS_SECRET_SUFFIX}"),
            ingress_name: project.clone(),
            ingress_class: defaults.ingress_class_for(&instance.spec).to_string(),
            admin_host: format!("{project}.{domain}"),
            api_host: format!("{project}{API_HOST_SUFFIX}.{domain}"),
            ingress_domain: domain,
            tls_issuer: defaults.tls_issuer.clone(),
            chart_version: defaults.chart_version_for(&instance.spec).to_string(),
            project,
        }
    }

    fn scheme(&self) -> &'static str {
        if self.tls_issuer.is_some() {
            "https"
        } else {
            "http"
        }
    }

    #[must_use]
    pub fn admin_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.admin_host)
    }

    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.api_host)
    }

    fn ui_service(&self) -> String {
        format!("{}-ui", self.release_name)
    }

    fn api_service(&self) -> String {
        format!("{}-api", self.release_name)
    }
}

/// What to do with one cluster object.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectAction<T> {
    Create(T),
    Update(T),
    Unchanged,
}

// ============================================================================
// Namespace
// ============================================================================

#[must_use]
pub fn build_namespace(desired: &DesiredState) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(desired.namespace.clone()),
            labels: Some(instance_labels(&desired.project, COMPONENT_NAMESPACE)),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Create the namespace if absent, or add missing labels. Extra labels are kept.
#[must_use]
pub fn plan_namespace(desired: &DesiredState, observed: Option<&Namespace>) -> ObjectAction<Namespace> {
    let Some(current) = observed else {
        return ObjectAction::Create(build_namespace(desired));
    };

    let expected = instance_labels(&desired.project, COMPONENT_NAMESPACE);
    if labels_contain(current.metadata.labels.as_ref(), &expected) {
        return ObjectAction::Unchanged;
    }

    let mut updated = current.clone();
    updated
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(expected);
    ObjectAction::Update(updated)
}

fn namespace_terminating(namespace: &Namespace) -> bool {
    namespace.metadata.deletion_timestamp.is_some()
        || namespace
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            == Some("Terminating")
}

// ============================================================================
// Credentials Secret
// ============================================================================

/// A random credential: URL-safe base64 of fresh random bytes.
#[must_use]
pub fn generate_secret_value() -> String {
    let bytes = rand::random::<[u8; GENERATED_SECRET_BYTES]>();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn deterministic_secret_data(desired: &DesiredState) -> [(&'static str, String); 2] {
    [
        (SECRET_KEY_PROJECT_NAME, desired.project.clone()),
        (SECRET_KEY_ADMIN_USERNAME, DEFAULT_ADMIN_USERNAME.to_string()),
    ]
}

/// Plan the credentials secret.
///
/// Deterministic keys are rewritten when they differ. Generated keys are filled in
/// only when missing, so existing credentials survive every reconcile.
pub fn plan_secret(
    desired: &DesiredState,
    observed: Option<&Secret>,
    generate: &mut dyn FnMut() -> String,
) -> ObjectAction<Secret> {
    let labels = instance_labels(&desired.project, COMPONENT_CREDENTIALS);

    let Some(current) = observed else {
        let mut data = BTreeMap::new();
        for (key, value) in deterministic_secret_data(desired) {
            data.insert(key.to_string(), ByteString(value.into_bytes()));
        }
        for key in GENERATED_SECRET_KEYS {
            data.insert(key.to_string(), ByteString(generate().into_bytes()));
        }
        return ObjectAction::Create(Secret {
            metadata: ObjectMeta {
                name: Some(desired.secret_name.clone()),
                namespace: Some(desired.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        });
    };

    let mut updated = current.clone();
    let mut changed = false;
    let data = updated.data.get_or_insert_with(BTreeMap::new);

    for (key, value) in deterministic_secret_data(desired) {
        let wanted = ByteString(value.into_bytes());
        if data.get(key) != Some(&wanted) {
            data.insert(key.to_string(), wanted);
            changed = true;
        }
    }
    for key in GENERATED_SECRET_KEYS {
        if data.get(key).is_none_or(|v| v.0.is_empty()) {
            data.insert(key.to_string(), ByteString(generate().into_bytes()));
            changed = true;
        }
    }

    if !labels_contain(current.metadata.labels.as_ref(), &labels) {
        updated
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels);
        changed = true;
    }

    if changed {
        ObjectAction::Update(updated)
    } else {
        ObjectAction::Unchanged
    }
}

/// Decode the secret's data into strings. Non UTF-8 values are skipped.
#[must_use]
pub fn secret_credentials(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .filter_map(|(k, v)| String::from_utf8(v.0.clone()).ok().map(|s| (k.clone(), s)))
        .collect()
}

fn missing_secret_keys(credentials: &BTreeMap<String, String>) -> Vec<&'static str> {
    [SECRET_KEY_PROJECT_NAME, SECRET_KEY_ADMIN_USERNAME]
        .into_iter()
        .chain(GENERATED_SECRET_KEYS)
        .filter(|k| credentials.get(*k).is_none_or(String::is_empty))
        .collect()
}

// ============================================================================
// Release
// ============================================================================

/// The release request for a desired instance and its credentials.
#[must_use]
pub fn release_request(
    desired: &DesiredState,
    credentials: &BTreeMap<String, String>,
    defaults: &ControllerDefaults,
) -> ReleaseRequest {
    let credential = |key: &str| credentials.get(key).cloned().unwrap_or_default();

    ReleaseRequest {
        name: desired.release_name.clone(),
        namespace: desired.namespace.clone(),
        chart_repository: defaults.chart_repository.clone(),
        chart_name: defaults.chart_name.clone(),
        chart_version: desired.chart_version.clone(),
        values: json!({
            "projectName": desired.project,
            "ingress": {
                "enabled": false,
                "className": desired.ingress_class,
                "domain": desired.ingress_domain,
                "adminHost": desired.admin_host,
                "apiHost": desired.api_host,
            },
            "credentials": {
                "existingSecret": desired.secret_name,
                "adminUsername": credential(SECRET_KEY_ADMIN_USERNAME),
                "adminPassword": credential(SECRET_KEY_ADMIN_PASSWORD),
                "apiKey": credential(SECRET_KEY_API_KEY),
                "databasePassword": credential(SECRET_KEY_DATABASE_PASSWORD),
            },
        }),
    }
}

/// Install when missing; upgrade when not deployed or when chart version or values
/// differ from the installed release.
#[must_use]
pub fn plan_release(
    request: &ReleaseRequest,
    observed: Option<&ReleaseInfo>,
) -> ObjectAction<ReleaseRequest> {
    match observed {
        None => ObjectAction::Create(request.clone()),
        Some(info) if !info.is_deployed() || !info.matches(request) => {
            ObjectAction::Update(request.clone())
        }
        Some(_) => ObjectAction::Unchanged,
    }
}

// ============================================================================
// Ingress
// ============================================================================

fn ingress_rule(host: &str, service: String) -> IngressRule {
    IngressRule {
        host: Some(host.to_string()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: service,
                        port: Some(ServiceBackendPort {
                            number: Some(RELEASE_SERVICE_PORT),
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
            }],
        }),
    }
}

#[must_use]
pub fn build_ingress_spec(desired: &DesiredState) -> IngressSpec {
    let tls = desired.tls_issuer.as_ref().map(|_| {
        vec![IngressTLS {
            hosts: Some(vec![desired.admin_host.clone(), desired.api_host.clone()]),
            secret_name: Some(format!("{}-tls", desired.ingress_name)),
        }]
    });

    IngressSpec {
        ingress_class_name: Some(desired.ingress_class.clone()),
        rules: Some(vec![
            ingress_rule(&desired.admin_host, desired.ui_service()),
            ingress_rule(&desired.api_host, desired.api_service()),
        ]),
        tls,
        ..Default::default()
    }
}

#[must_use]
pub fn build_ingress(desired: &DesiredState) -> Ingress {
    let annotations = desired.tls_issuer.as_ref().map(|issuer| {
        BTreeMap::from([(
            CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION.to_string(),
            issuer.clone(),
        )])
    });

    Ingress {
        metadata: ObjectMeta {
            name: Some(desired.ingress_name.clone()),
            namespace: Some(desired.namespace.clone()),
            labels: Some(instance_labels(&desired.project, COMPONENT_INGRESS)),
            annotations,
            ..Default::default()
        },
        spec: Some(build_ingress_spec(desired)),
        ..Default::default()
    }
}

fn ingress_matches(desired: &DesiredState, current: &Ingress) -> bool {
    let issuer = current
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION));

    current.spec.as_ref() == Some(&build_ingress_spec(desired))
        && issuer == desired.tls_issuer.as_ref()
        && labels_contain(
            current.metadata.labels.as_ref(),
            &instance_labels(&desired.project, COMPONENT_INGRESS),
        )
}

/// Create the ingress if absent, or rewrite its spec, labels and issuer annotation
/// when they drifted. Unrelated metadata on the live object is preserved.
#[must_use]
pub fn plan_ingress(desired: &DesiredState, observed: Option<&Ingress>) -> ObjectAction<Ingress> {
    let Some(current) = observed else {
        return ObjectAction::Create(build_ingress(desired));
    };
    if ingress_matches(desired, current) {
        return ObjectAction::Unchanged;
    }

    let mut updated = current.clone();
    updated.spec = Some(build_ingress_spec(desired));
    updated
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(instance_labels(&desired.project, COMPONENT_INGRESS));
    let annotations = updated.metadata.annotations.get_or_insert_with(BTreeMap::new);
    match &desired.tls_issuer {
        Some(issuer) => {
            annotations.insert(
                CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION.to_string(),
                issuer.clone(),
            );
        }
        None => {
            annotations.remove(CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION);
        }
    }
    ObjectAction::Update(updated)
}

// ============================================================================
// Apply
// ============================================================================

fn ns_err(e: ClusterError) -> ProvisionError {
    ProvisionError::cluster(SubResource::Namespace, e)
}

fn secret_err(e: ClusterError) -> ProvisionError {
    ProvisionError::cluster(SubResource::Secrets, e)
}

fn ingress_err(e: ClusterError) -> ProvisionError {
    ProvisionError::cluster(SubResource::Ingress, e)
}

/// Create or update every sub-resource of the instance, in dependency order.
///
/// # Errors
///
/// Returns a [`ProvisionError`] naming the first sub-resource that failed. Objects
/// converged before the failure are left in place.
pub async fn converge(ctx: &Context, desired: &DesiredState) -> Result<(), ProvisionError> {
    let cluster = ctx.cluster.as_ref();

    // 1. Namespace
    let observed = cluster.get_namespace(&desired.namespace).await.map_err(ns_err)?;
    match plan_namespace(desired, observed.as_ref()) {
        ObjectAction::Create(ns) => {
            match cluster.create_namespace(&ns).await {
                Ok(_) => {
                    info!("Created namespace {}", desired.namespace);
                    metrics::record_resource_created("Namespace");
                }
                // Lost a race with a previous attempt; the next reconcile re-plans it.
                Err(ClusterError::AlreadyExists(_)) => {
                    debug!("Namespace {} already exists", desired.namespace);
                }
                Err(e) => return Err(ns_err(e)),
            }
        }
        ObjectAction::Update(ns) => {
            cluster.replace_namespace(&ns).await.map_err(ns_err)?;
            info!("Updated labels on namespace {}", desired.namespace);
            metrics::record_resource_updated("Namespace");
        }
        ObjectAction::Unchanged => debug!("Namespace {} unchanged", desired.namespace),
    }

    // 2. Credentials
    let observed = cluster
        .get_secret(&desired.namespace, &desired.secret_name)
        .await
        .map_err(secret_err)?;
    let secret = match plan_secret(desired, observed.as_ref(), &mut generate_secret_value) {
        ObjectAction::Create(secret) => {
            let created = cluster
                .create_secret(&desired.namespace, &secret)
                .await
                .map_err(secret_err)?;
            info!("Created secret {}/{}", desired.namespace, desired.secret_name);
            metrics::record_resource_created("Secret");
            created
        }
        ObjectAction::Update(secret) => {
            let replaced = cluster
                .replace_secret(&desired.namespace, &secret)
                .await
                .map_err(secret_err)?;
            info!("Updated secret {}/{}", desired.namespace, desired.secret_name);
            metrics::record_resource_updated("Secret");
            replaced
        }
        ObjectAction::Unchanged => {
            debug!("Secret {}/{} unchanged", desired.namespace, desired.secret_name);
            observed.unwrap_or_default()
        }
    };

    // 3. Release
    let request = release_request(desired, &secret_credentials(&secret), &ctx.defaults);
    let installed = ctx
        .releases
        .status(&desired.namespace, &desired.release_name)
        .await
        .map_err(|e| ProvisionError::release(SubResource::HelmRelease, e))?;
    match plan_release(&request, installed.as_ref()) {
        ObjectAction::Create(req) | ObjectAction::Update(req) => {
            let info = ctx
                .releases
                .install_or_upgrade(&req)
                .await
                .map_err(|e| ProvisionError::release(SubResource::HelmRelease, e))?;
            info!(
                "Release {}/{} at revision {} ({})",
                info.namespace, info.name, info.revision, info.status
            );
            if installed.is_some() {
                metrics::record_resource_updated("HelmRelease");
            } else {
                metrics::record_resource_created("HelmRelease");
            }
        }
        ObjectAction::Unchanged => debug!("Release {} unchanged", desired.release_name),
    }

    // 4. Ingress
    let observed = cluster
        .get_ingress(&desired.namespace, &desired.ingress_name)
        .await
        .map_err(ingress_err)?;
    match plan_ingress(desired, observed.as_ref()) {
        ObjectAction::Create(ingress) => {
            cluster
                .create_ingress(&desired.namespace, &ingress)
                .await
                .map_err(ingress_err)?;
            info!("Created ingress {}/{}", desired.namespace, desired.ingress_name);
            metrics::record_resource_created("Ingress");
        }
        ObjectAction::Update(ingress) => {
            cluster
                .replace_ingress(&desired.namespace, &ingress)
                .await
                .map_err(ingress_err)?;
            info!("Updated ingress {}/{}", desired.namespace, desired.ingress_name);
            metrics::record_resource_updated("Ingress");
        }
        ObjectAction::Unchanged => debug!("Ingress {} unchanged", desired.ingress_name),
    }

    Ok(())
}

// ============================================================================
// Observe
// ============================================================================

async fn observe_namespace(
    ctx: &Context,
    desired: &DesiredState,
) -> Result<AspectObservation, ProvisionError> {
    let observed = ctx
        .cluster
        .get_namespace(&desired.namespace)
        .await
        .map_err(ns_err)?;
    Ok(match observed {
        None => AspectObservation::not_ready(
            REASON_NAMESPACE_MISSING,
            format!("Namespace {} does not exist", desired.namespace),
        ),
        Some(ns) if namespace_terminating(&ns) => AspectObservation::not_ready(
            REASON_NAMESPACE_TERMINATING,
            format!("Namespace {} is terminating", desired.namespace),
        ),
        Some(_) => AspectObservation::ready(
            REASON_READY,
            format!("Namespace {} exists", desired.namespace),
        ),
    })
}

async fn observe_secret(
    ctx: &Context,
    desired: &DesiredState,
) -> Result<(AspectObservation, Option<BTreeMap<String, String>>), ProvisionError> {
    let observed = ctx
        .cluster
        .get_secret(&desired.namespace, &desired.secret_name)
        .await
        .map_err(secret_err)?;
    let Some(secret) = observed else {
        return Ok((
            AspectObservation::not_ready(
                REASON_SECRET_MISSING,
                format!("Secret {} does not exist", desired.secret_name),
            ),
            None,
        ));
    };

    let credentials = secret_credentials(&secret);
    let missing = missing_secret_keys(&credentials);
    if missing.is_empty() {
        Ok((
            AspectObservation::ready(
                REASON_READY,
                format!("Secret {} holds all credentials", desired.secret_name),
            ),
            Some(credentials),
        ))
    } else {
        Ok((
            AspectObservation::not_ready(
                REASON_SECRET_INCOMPLETE,
                format!(
                    "Secret {} is missing keys: {}",
                    desired.secret_name,
                    missing.join(", ")
                ),
            ),
            None,
        ))
    }
}

async fn observe_release(
    ctx: &Context,
    desired: &DesiredState,
    credentials: Option<&BTreeMap<String, String>>,
) -> Result<AspectObservation, ProvisionError> {
    let installed = ctx
        .releases
        .status(&desired.namespace, &desired.release_name)
        .await
        .map_err(|e| ProvisionError::release(SubResource::HelmRelease, e))?;

    let Some(info) = installed else {
        return Ok(AspectObservation::not_ready(
            REASON_RELEASE_MISSING,
            format!("Release {} is not installed", desired.release_name),
        ));
    };
    if !info.is_deployed() {
        return Ok(AspectObservation::not_ready(
            REASON_RELEASE_NOT_DEPLOYED,
            format!("Release {} is {}", info.name, info.status),
        ));
    }

    let outdated = match credentials {
        Some(credentials) => {
            !info.matches(&release_request(desired, credentials, &ctx.defaults))
        }
        None => info.chart_version != desired.chart_version,
    };
    if outdated {
        return Ok(AspectObservation::not_ready(
            REASON_RELEASE_OUTDATED,
            format!(
                "Release {} runs chart {} {}, want {}",
                info.name, info.chart_name, info.chart_version, desired.chart_version
            ),
        ));
    }

    Ok(AspectObservation::ready(
        REASON_READY,
        format!(
            "Release {} revision {} is deployed",
            info.name, info.revision
        ),
    ))
}

async fn observe_ingress(
    ctx: &Context,
    desired: &DesiredState,
) -> Result<AspectObservation, ProvisionError> {
    let observed = ctx
        .cluster
        .get_ingress(&desired.namespace, &desired.ingress_name)
        .await
        .map_err(ingress_err)?;
    Ok(match observed {
        None => AspectObservation::not_ready(
            REASON_INGRESS_MISSING,
            format!("Ingress {} does not exist", desired.ingress_name),
        ),
        Some(ingress) if !ingress_matches(desired, &ingress) => AspectObservation::not_ready(
            REASON_INGRESS_DRIFTED,
            format!(
                "Ingress {} does not route {} and {}",
                desired.ingress_name, desired.admin_host, desired.api_host
            ),
        ),
        Some(_) => AspectObservation::ready(
            REASON_READY,
            format!("Ingress routes {} and {}", desired.admin_host, desired.api_host),
        ),
    })
}

/// Permanent observation failures become a False aspect; transient ones abort.
fn settle_observation(
    result: Result<AspectObservation, ProvisionError>,
) -> Result<AspectObservation, ProvisionError> {
    match result {
        Ok(obs) => Ok(obs),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => Ok(AspectObservation::not_ready(
            REASON_OBSERVATION_FAILED,
            e.to_string(),
        )),
    }
}

/// Read-only health check of every sub-resource.
///
/// # Errors
///
/// Returns a [`ProvisionError`] only for transient failures. Permanent read
/// failures are reported as a False aspect with reason `ObservationFailed`.
pub async fn observe(ctx: &Context, desired: &DesiredState) -> Result<Observations, ProvisionError> {
    let namespace = settle_observation(observe_namespace(ctx, desired).await)?;

    let (secrets, credentials) = match observe_secret(ctx, desired).await {
        Ok(found) => found,
        Err(e) => (settle_observation(Err(e))?, None),
    };

    let release = settle_observation(observe_release(ctx, desired, credentials.as_ref()).await)?;
    let ingress = settle_observation(observe_ingress(ctx, desired).await)?;

    Ok(Observations {
        namespace,
        secrets,
        release,
        ingress,
    })
}

// ============================================================================
// Teardown
// ============================================================================

/// Uninstall the release. Succeeds if it is already gone.
///
/// # Errors
///
/// Returns a [`ProvisionError`] if the release manager fails.
pub async fn uninstall_release(ctx: &Context, desired: &DesiredState) -> Result<(), ProvisionError> {
    ctx.releases
        .uninstall(&desired.namespace, &desired.release_name)
        .await
        .map_err(|e| ProvisionError::release(SubResource::HelmRelease, e))?;
    info!("Uninstalled release {}/{}", desired.namespace, desired.release_name);
    metrics::record_resource_deleted("HelmRelease");
    Ok(())
}

/// Delete the tenant namespace and everything in it.
///
/// # Errors
///
/// Returns a [`ProvisionError`] if the delete call fails.
pub async fn delete_namespace(ctx: &Context, desired: &DesiredState) -> Result<(), ProvisionError> {
    if ctx
        .cluster
        .delete_namespace(&desired.namespace)
        .await
        .map_err(ns_err)?
    {
        info!("Deleted namespace {}", desired.namespace);
        metrics::record_resource_deleted("Namespace");
    } else {
        debug!("Namespace {} already gone", desired.namespace);
    }
    Ok(())
}

#[cfg(test)]
#[path = "provisioner_tests.rs"]
mod provisioner_tests;
