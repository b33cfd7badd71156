//! Execution Timeout Management
//!
//! This module provides the optional wall-clock limit for subprocess execution.

use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// Wall-clock limit applied to a running command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use shell_guard::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    ///
    /// Zero means "no limit" and yields `None`, matching how the
    /// configuration and the `--timeout` flag treat it.
    pub fn from_secs(secs: u64) -> Option<Self> {
        (secs > 0).then(|| Self::new(Duration::from_secs(secs)))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drive a future until it completes or the limit expires
    ///
    /// Returns `None` on expiry. The future is dropped at that point, so any
    /// borrow it held is released for the caller to clean up.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        match time::timeout(self.duration, future).await {
            Ok(output) => Some(output),
            Err(_) => {
                debug!("Execution exceeded {:?}", self.duration);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_new() {
        let timeout = ExecutionTimeout::new(Duration::from_secs(30));
        assert_eq!(timeout.duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_timeout_from_secs() {
        let timeout = ExecutionTimeout::from_secs(45).unwrap();
        assert_eq!(timeout.duration(), Duration::from_secs(45));
    }

    #[test]
    fn test_timeout_zero_disables() {
        assert!(ExecutionTimeout::from_secs(0).is_none());
    }

    #[tokio::test]
    async fn test_timeout_run_success() {
        let timeout = ExecutionTimeout::from_secs(10).unwrap();
        let result = timeout.run(async { "test value".to_string() }).await;
        assert_eq!(result.as_deref(), Some("test value"));
    }

    #[tokio::test]
    async fn test_timeout_run_expires() {
        let timeout = ExecutionTimeout::new(Duration::from_millis(100));

        let result = timeout
            .run(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
            })
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_timeout_run_just_in_time() {
        let timeout = ExecutionTimeout::from_secs(1).unwrap();

        let result = timeout
            .run(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<(), std::io::Error>(())
            })
            .await;

        assert!(matches!(result, Some(Ok(()))));
    }
}
