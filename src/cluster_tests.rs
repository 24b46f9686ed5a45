// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::cluster::{status_patch, ClusterError};
    use crate::crd::{Phase, TenantInstanceStatus};
    use serde_json::Value;

    #[test]
    fn test_conflict_is_transient() {
        let err = ClusterError::Conflict("the object has been modified".into());
        assert!(err.is_transient());
        assert!(err.is_conflict());
    }

    #[test]
    fn test_api_error_classification() {
        let throttled = ClusterError::Api {
            code: 429,
            reason: "TooManyRequests".into(),
            message: "slow down".into(),
        };
        let forbidden = ClusterError::Api {
            code: 403,
            reason: "Forbidden".into(),
            message: "no".into(),
        };
        assert!(throttled.is_transient());
        assert!(!forbidden.is_transient());
        assert!(!forbidden.is_conflict());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!ClusterError::AlreadyExists("x".into()).is_transient());
        assert!(!ClusterError::Serialization("x".into()).is_transient());
        assert!(!ClusterError::Client("x".into()).is_transient());
        assert!(ClusterError::Transport("x".into()).is_transient());
    }

    #[test]
    fn test_display_includes_code() {
        let err = ClusterError::Api {
            code: 500,
            reason: "InternalError".into(),
            message: "etcd timeout".into(),
        };
        assert_eq!(err.to_string(), "API error 500 (InternalError): etcd timeout");
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err = ClusterError::from(serde_err);
        assert!(matches!(err, ClusterError::Serialization(_)));
    }

    #[test]
    fn test_status_patch_clears_error_message_when_leaving_failed() {
        let status = TenantInstanceStatus {
            phase: Phase::Provisioning,
            failure_count: 1,
            ..Default::default()
        };
        let patch = status_patch("42", &status).unwrap();

        assert_eq!(patch["metadata"]["resourceVersion"], "42");
        let body = patch["status"].as_object().unwrap();
        assert_eq!(body["phase"], "Provisioning");
        assert_eq!(body.get("errorMessage"), Some(&Value::Null));
        assert_eq!(body.get("lastFailureTime"), Some(&Value::Null));
    }

    #[test]
    fn test_status_patch_sends_every_status_field() {
        let status = TenantInstanceStatus {
            error_message: Some("BackoffLimitExceeded".to_string()),
            observed_generation: Some(2),
            ..Default::default()
        };
        let patch = status_patch("1", &status).unwrap();
        let body = patch["status"].as_object().unwrap();

        assert_eq!(body["errorMessage"], "BackoffLimitExceeded");
        assert_eq!(body["observedGeneration"], 2);
        let mut keys: Vec<&str> = body.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "adminUrl",
                "apiUrl",
                "cleanupJob",
                "conditions",
                "errorMessage",
                "failureCount",
                "lastFailureTime",
                "namespace",
                "observedGeneration",
                "phase",
                "provisioningJob",
                "releaseName",
            ]
        );
    }
}
