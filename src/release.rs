// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Packaged-application release capability.
//!
//! The provisioner installs, upgrades and removes the tenant application through the
//! [`ReleaseManager`] trait. [`HelmCli`] implements it by driving the `helm` binary.
//! Chart contents are opaque here: the core only passes chart coordinates and values.
//!
//! Every install records a digest of the values it applied in the release
//! description, so drift can be detected from `helm status` without reading back
//! values that contain generated credentials.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Prefix of the release description that carries the values digest.
pub const VALUES_DIGEST_PREFIX: &str = "values-sha256:";

/// Release status reported once an install or upgrade has completed.
pub const RELEASE_STATUS_DEPLOYED: &str = "deployed";

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse release output: {0}")]
    Parse(String),

    #[error("failed to render release values: {0}")]
    Values(String),
}

/// Helm stderr fragments that clear up on their own: a release locked by an
/// interrupted operation, or an API server that is busy or unreachable.
const TRANSIENT_HELM_ERRORS: [&str; 10] = [
    "another operation (install/upgrade/rollback) is in progress",
    "the object has been modified",
    "too many requests",
    "the server is currently unable to handle the request",
    "etcdserver: request timed out",
    "connection refused",
    "connection reset by peer",
    "i/o timeout",
    "tls handshake timeout",
    "context deadline exceeded",
];

impl ReleaseError {
    /// True when retrying the same command later can succeed.
    ///
    /// A missing or non-executable `helm` binary is a configuration error; any other
    /// I/O failure while talking to the child process is retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ReleaseError::Spawn { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            ReleaseError::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                TRANSIENT_HELM_ERRORS.iter().any(|m| stderr.contains(m))
            }
            ReleaseError::Parse(_) | ReleaseError::Values(_) => false,
        }
    }
}

/// Desired state of one release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    pub name: String,
    pub namespace: String,
    pub chart_repository: String,
    pub chart_name: String,
    pub chart_version: String,
    pub values: serde_json::Value,
}

impl ReleaseRequest {
    /// Digest of the values this request would apply.
    #[must_use]
    pub fn values_digest(&self) -> String {
        values_digest(&self.values)
    }
}

/// Observed state of an installed release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: i64,
    /// Helm status string, e.g. `deployed`, `failed`, `pending-upgrade`.
    pub status: String,
    pub chart_name: String,
    pub chart_version: String,
    /// Digest recorded by the last install, if the release was installed by this operator.
    pub values_digest: Option<String>,
}

impl ReleaseInfo {
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.status == RELEASE_STATUS_DEPLOYED
    }

    /// True when the installed chart version and values match the request.
    #[must_use]
    pub fn matches(&self, request: &ReleaseRequest) -> bool {
        self.chart_name == request.chart_name
            && self.chart_version == request.chart_version
            && self.values_digest.as_deref() == Some(request.values_digest().as_str())
    }
}

/// Install, upgrade and remove packaged-application releases.
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Current state of a release, `None` if it is not installed.
    async fn status(&self, namespace: &str, name: &str) -> Result<Option<ReleaseInfo>, ReleaseError>;

    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseInfo, ReleaseError>;

    /// Remove a release. Succeeds if the release is already gone.
    async fn uninstall(&self, namespace: &str, name: &str) -> Result<(), ReleaseError>;
}

/// Hex SHA-256 of the canonical JSON form of `values`.
#[must_use]
pub fn values_digest(values: &serde_json::Value) -> String {
    // serde_json maps are sorted, so the encoding is canonical.
    let encoded = values.to_string();
    let digest = Sha256::digest(encoded.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Deserialize)]
struct HelmStatus {
    name: String,
    namespace: String,
    #[serde(default)]
    version: i64,
    info: HelmStatusInfo,
    chart: HelmChart,
}

#[derive(Deserialize)]
struct HelmStatusInfo {
    #[serde(default)]
    status: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct HelmChart {
    metadata: HelmChartMetadata,
}

#[derive(Deserialize)]
struct HelmChartMetadata {
    name: String,
    version: String,
}

/// Parse the JSON printed by `helm status -o json` and `helm upgrade -o json`.
///
/// # Errors
///
/// Returns [`ReleaseError::Parse`] if the output is not a release document.
pub fn parse_release(json: &str) -> Result<ReleaseInfo, ReleaseError> {
    let status: HelmStatus =
        serde_json::from_str(json).map_err(|e| ReleaseError::Parse(e.to_string()))?;
    let values_digest = status
        .info
        .description
        .strip_prefix(VALUES_DIGEST_PREFIX)
        .map(str::to_string);

    Ok(ReleaseInfo {
        name: status.name,
        namespace: status.namespace,
        revision: status.version,
        status: status.info.status,
        chart_name: status.chart.metadata.name,
        chart_version: status.chart.metadata.version,
        values_digest,
    })
}

/// Arguments for `helm upgrade --install`, excluding the binary itself.
#[must_use]
pub fn upgrade_args(request: &ReleaseRequest) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        request.name.clone(),
    ];

    if request.chart_repository.starts_with("oci://") {
        args.push(format!(
            "{}/{}",
            request.chart_repository.trim_end_matches('/'),
            request.chart_name
        ));
    } else {
        args.push(request.chart_name.clone());
        args.push("--repo".to_string());
        args.push(request.chart_repository.clone());
    }

    args.extend([
        "--version".to_string(),
        request.chart_version.clone(),
        "--namespace".to_string(),
        request.namespace.clone(),
        "--values".to_string(),
        "-".to_string(),
        "--description".to_string(),
        format!("{VALUES_DIGEST_PREFIX}{}", request.values_digest()),
        "--output".to_string(),
        "json".to_string(),
    ]);
    args
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("release: not found")
}

/// [`ReleaseManager`] backed by the `helm` command-line tool.
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
}

impl HelmCli {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<std::process::Output, ReleaseError> {
        let command = format!("{} {}", self.binary, args.first().map_or("", String::as_str));
        debug!(command = %command, "Running helm");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReleaseError::Spawn {
                command: command.clone(),
                source,
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .await
                .map_err(|source| ReleaseError::Spawn {
                    command: command.clone(),
                    source,
                })?;
            // Close stdin so helm sees EOF.
            drop(pipe);
        }

        child
            .wait_with_output()
            .await
            .map_err(|source| ReleaseError::Spawn { command, source })
    }
}

fn failed(command: &str, output: &std::process::Output) -> ReleaseError {
    ReleaseError::CommandFailed {
        command: command.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl ReleaseManager for HelmCli {
    async fn status(&self, namespace: &str, name: &str) -> Result<Option<ReleaseInfo>, ReleaseError> {
        let args: Vec<String> = ["status", name, "--namespace", namespace, "--output", "json"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let output = self.run(&args, None).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(failed("helm status", &output));
        }

        parse_release(&String::from_utf8_lossy(&output.stdout)).map(Some)
    }

    async fn install_or_upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseInfo, ReleaseError> {
        let values = serde_yaml::to_string(&request.values)
            .map_err(|e| ReleaseError::Values(e.to_string()))?;
        let output = self
            .run(&upgrade_args(request), Some(values.as_bytes()))
            .await?;

        if !output.status.success() {
            return Err(failed("helm upgrade", &output));
        }

        let info = parse_release(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            release = %info.name,
            namespace = %info.namespace,
            revision = info.revision,
            chart_version = %info.chart_version,
            "Release installed or upgraded"
        );
        Ok(info)
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> Result<(), ReleaseError> {
        let args: Vec<String> = ["uninstall", name, "--namespace", namespace, "--ignore-not-found"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let output = self.run(&args, None).await?;

        if !output.status.success() {
            return Err(failed("helm uninstall", &output));
        }
        info!(release = %name, namespace = %namespace, "Release uninstalled");
        Ok(())
    }
}
