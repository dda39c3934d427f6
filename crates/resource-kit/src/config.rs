//! Cache configuration.

use crate::error::KitError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a [`ResourceCache`](crate::ResourceCache) and its store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a batch stays open after its first stale key (one frame by default).
    pub batch_window_ms: u64,
    /// Capacity of the store actor's request channel.
    pub store_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: 16,
            store_buffer: 32,
        }
    }
}

impl CacheConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `RESOURCE_KIT_BATCH_WINDOW_MS`: batch window in milliseconds (default: 16)
    /// - `RESOURCE_KIT_STORE_BUFFER`: store request channel capacity (default: 32)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            batch_window_ms: std::env::var("RESOURCE_KIT_BATCH_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_window_ms),
            store_buffer: std::env::var("RESOURCE_KIT_STORE_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.store_buffer),
        }
    }

    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn validate(&self) -> Result<(), KitError> {
        if self.batch_window_ms == 0 {
            return Err(KitError::InvalidConfig(
                "batch_window_ms must be positive".to_string(),
            ));
        }
        if self.store_buffer == 0 {
            return Err(KitError::InvalidConfig(
                "store_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert_eq!(config.batch_window(), Duration::from_millis(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"batch_window_ms": 50}"#).unwrap();
        assert_eq!(config.batch_window_ms, 50);
        assert_eq!(config.store_buffer, 32);
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = CacheConfig::default().with_batch_window(Duration::ZERO);
        assert!(matches!(config.validate(), Err(KitError::InvalidConfig(_))));
    }
}
