// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_backoff, is_retryable_error};
    use crate::cluster::ClusterError;
    use std::time::Duration;

    fn api_error(code: u16) -> ClusterError {
        ClusterError::Api {
            code,
            reason: "Test".to_string(),
            message: "test error".to_string(),
        }
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(5));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(30)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = default_backoff();
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(90) && first <= Duration::from_millis(110));

        for _ in 0..10 {
            let next = backoff.next_backoff().unwrap();
            assert!(next <= Duration::from_millis(5500), "interval {next:?} exceeds cap");
        }
        assert_eq!(backoff.current_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_429_and_5xx_are_retryable() {
        assert!(is_retryable_error(&api_error(429)));
        assert!(is_retryable_error(&api_error(500)));
        assert!(is_retryable_error(&api_error(503)));
        assert!(is_retryable_error(&api_error(599)));
    }

    #[test]
    fn test_4xx_not_retryable() {
        assert!(!is_retryable_error(&api_error(400)));
        assert!(!is_retryable_error(&api_error(401)));
        assert!(!is_retryable_error(&api_error(404)));
    }

    #[test]
    fn test_transport_retryable_conflict_not() {
        assert!(is_retryable_error(&ClusterError::Transport("connection reset".into())));
        assert!(!is_retryable_error(&ClusterError::Conflict("stale".into())));
        assert!(!is_retryable_error(&ClusterError::AlreadyExists("job".into())));
    }
}
