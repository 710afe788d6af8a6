//! Retry configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many calls to make and how long to keep trying.
///
/// Immutable once handed to a [`Retry`](crate::retry::Retry). Can be embedded
/// in configuration files; the window is written in seconds:
///
/// ```rust
/// use rebound_core::policy::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy = serde_json::from_str(
///     r#"{ "max_calls_total": 5, "window_seconds": 120, "namespace": "billing" }"#,
/// ).unwrap();
///
/// assert_eq!(policy.max_calls_total, 5);
/// assert_eq!(policy.window, Duration::from_secs(120));
/// assert_eq!(policy.namespace.as_deref(), Some("billing"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total calls including the first one. Below 2 there is nothing to retry.
    pub max_calls_total: u32,

    /// Time budget for all retries, starting at the first call.
    #[serde(rename = "window_seconds", with = "window_seconds")]
    pub window: Duration,

    /// Override namespace this call site listens to. `None` is shared by
    /// every call site that does not name one.
    pub namespace: Option<String>,
}

impl Default for RetryPolicy {
    /// 3 calls within 60 seconds, no namespace.
    fn default() -> Self {
        Self {
            max_calls_total: 3,
            window: Duration::from_secs(60),
            namespace: None,
        }
    }
}

impl RetryPolicy {
    /// A policy without a namespace.
    pub fn new(max_calls_total: u32, window: Duration) -> Self {
        Self {
            max_calls_total,
            window,
            namespace: None,
        }
    }

    /// Build a policy from a window in seconds.
    ///
    /// Fails if `window_seconds` is negative, NaN, infinite or too large.
    pub fn from_window_seconds(
        max_calls_total: u32,
        window_seconds: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(max_calls_total, window_from_seconds(window_seconds)?))
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Whether the policy allows any retry at all.
    pub fn allows_retries(&self) -> bool {
        self.max_calls_total >= 2
    }

    pub(crate) fn warn_if_vacuous(&self) {
        if !self.allows_retries() {
            tracing::warn!(
                max_calls_total = self.max_calls_total,
                namespace = ?self.namespace,
                "max_calls_total below 2 disables retrying; the operation is called at most once"
            );
        }
    }
}

fn window_from_seconds(seconds: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidWindow(seconds))
}

mod window_seconds {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(window.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        super::window_from_seconds(seconds).map_err(D::Error::custom)
    }
}
