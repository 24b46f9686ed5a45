// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_reasons` module

#[cfg(test)]
mod tests {
    use crate::status_reasons::*;

    #[test]
    fn test_ready_reasons_are_distinct() {
        assert_eq!(REASON_ALL_READY, "AllReady");
        assert_eq!(REASON_READY, "Ready");
        assert_ne!(REASON_ALL_READY, REASON_READY);
        assert_ne!(REASON_NOT_READY, REASON_READY);
    }

    #[test]
    fn test_paused_reason_is_not_a_failure_reason() {
        assert_eq!(REASON_PAUSED, "Paused");
        assert_ne!(REASON_PAUSED, REASON_JOB_FAILED);
        assert_ne!(REASON_PAUSED, REASON_INVALID_SPEC);
    }

    #[test]
    fn test_reasons_are_camel_case() {
        let reasons = [
            REASON_ALL_READY,
            REASON_READY,
            REASON_NOT_READY,
            REASON_PENDING,
            REASON_NAMESPACE_MISSING,
            REASON_NAMESPACE_TERMINATING,
            REASON_SECRET_MISSING,
            REASON_SECRET_INCOMPLETE,
            REASON_RELEASE_MISSING,
            REASON_RELEASE_NOT_DEPLOYED,
            REASON_RELEASE_OUTDATED,
            REASON_INGRESS_MISSING,
            REASON_INGRESS_DRIFTED,
            REASON_OBSERVATION_FAILED,
            REASON_PAUSED,
            REASON_INVALID_SPEC,
            REASON_DELETING,
            REASON_PROVISION_FAILED,
            REASON_JOB_FAILED,
        ];
        for reason in reasons {
            assert!(reason.chars().next().unwrap().is_ascii_uppercase(), "{reason}");
            assert!(reason.chars().all(|c| c.is_ascii_alphanumeric()), "{reason}");
        }
    }

    #[test]
    fn test_condition_status_values() {
        assert_eq!(CONDITION_STATUS_TRUE, "True");
        assert_eq!(CONDITION_STATUS_FALSE, "False");
        assert_eq!(CONDITION_STATUS_UNKNOWN, "Unknown");
    }
}
