// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors` module

#[cfg(test)]
mod tests {
    use crate::cluster::ClusterError;
    use crate::errors::*;
    use crate::release::ReleaseError;

    fn api(code: u16) -> ClusterError {
        ClusterError::Api {
            code,
            reason: "Reason".to_string(),
            message: "message".to_string(),
        }
    }

    #[test]
    fn test_provision_error_names_resource() {
        let err = ProvisionError::cluster(SubResource::Ingress, api(422));
        let rendered = err.to_string();
        assert!(rendered.starts_with("Ingress: "), "{rendered}");
        assert!(rendered.contains("422"));
    }

    #[test]
    fn test_provision_error_transience_follows_cluster_error() {
        assert!(ProvisionError::cluster(SubResource::Namespace, api(503)).is_transient());
        assert!(!ProvisionError::cluster(SubResource::Namespace, api(403)).is_transient());
        assert!(ProvisionError::cluster(
            SubResource::Secrets,
            ClusterError::Transport("reset".to_string())
        )
        .is_transient());
    }

    #[test]
    fn test_locked_release_is_transient() {
        let err = ProvisionError::release(
            SubResource::HelmRelease,
            ReleaseError::CommandFailed {
                command: "helm upgrade".to_string(),
                code: Some(1),
                stderr: "Error: UPGRADE FAILED: another operation (install/upgrade/rollback) is in progress".to_string(),
            },
        );
        assert!(err.is_transient());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_release_failures_are_permanent() {
        let err = ProvisionError::release(
            SubResource::HelmRelease,
            ReleaseError::CommandFailed {
                command: "helm upgrade".to_string(),
                code: Some(1),
                stderr: "chart not found".to_string(),
            },
        );
        assert!(!err.is_transient());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_detection() {
        let conflict = ClusterError::Conflict("stale".to_string());
        assert!(Error::Cluster(conflict.clone()).is_conflict());
        assert!(Error::Provision(ProvisionError::cluster(SubResource::Namespace, conflict)).is_conflict());
        assert!(!Error::LeadershipLost.is_conflict());
        assert!(!Error::ConflictRetriesExhausted { attempts: 3 }.is_conflict());
    }

    #[test]
    fn test_metric_labels() {
        assert_eq!(
            Error::Cluster(ClusterError::Conflict("x".to_string())).metric_label(),
            "conflict"
        );
        assert_eq!(Error::Cluster(api(500)).metric_label(), "cluster_error");
        assert_eq!(
            Error::Provision(ProvisionError::cluster(SubResource::Job, api(500))).metric_label(),
            "provision_error"
        );
        assert_eq!(
            Error::ConflictRetriesExhausted { attempts: 3 }.metric_label(),
            "conflict"
        );
        assert_eq!(Error::LeadershipLost.metric_label(), "leadership_lost");
    }

    #[test]
    fn test_sub_resource_display() {
        assert_eq!(SubResource::HelmRelease.to_string(), "HelmRelease");
        assert_eq!(SubResource::Secrets.as_str(), "Secrets");
    }
}
