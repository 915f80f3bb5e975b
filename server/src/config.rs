//! Engine-wide configuration (spec §6 "Engine constructor options") plus the
//! one knob this expansion adds to resolve the retransmission-queue Open
//! Question from spec §9.

use thiserror::Error;

use opcua_core::constants;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("minimum_publishing_interval ({minimum}ms) must not exceed maximum_publishing_interval ({maximum}ms)")]
    MinExceedsMax { minimum: i64, maximum: i64 },
    #[error("default_publishing_interval ({default}ms) must lie within [{minimum}, {maximum}]")]
    DefaultOutOfRange { default: i64, minimum: i64, maximum: i64 },
}

/// spec §6 enumerates `maxPublishRequestInQueue`, `minimumPublishingInterval`,
/// `maximumPublishingInterval` and `defaultPublishingInterval` as the
/// constructor options; `max_retransmission_queue_size` is this expansion's
/// answer to spec §9's open retransmission-bound question.
#[derive(Debug, Clone)]
pub struct PublishEngineConfig {
    /// `None` reproduces spec §3's dynamic default
    /// (`max(subscriptionCount * 2, 4)`); `Some(n)` pins the fixed value
    /// spec §6 documents as the constructor default (100).
    pub max_publish_request_in_queue: Option<usize>,
    pub minimum_publishing_interval: i64,
    pub maximum_publishing_interval: i64,
    pub default_publishing_interval: i64,
    /// `None` means compute the cap from `max_notifications_per_publish *
    /// max_keep_alive_count` (clamped to `RETRANSMISSION_QUEUE_HARD_CAP`)
    /// for each subscription, per spec §9.
    pub max_retransmission_queue_size: Option<usize>,
}

impl Default for PublishEngineConfig {
    fn default() -> Self {
        PublishEngineConfig {
            max_publish_request_in_queue: Some(constants::DEFAULT_MAX_PUBLISH_REQUEST_IN_QUEUE),
            minimum_publishing_interval: 50,
            maximum_publishing_interval: 24 * 60 * 60 * 1000,
            default_publishing_interval: 1000,
            max_retransmission_queue_size: None,
        }
    }
}

impl PublishEngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_publishing_interval > self.maximum_publishing_interval {
            return Err(ConfigError::MinExceedsMax {
                minimum: self.minimum_publishing_interval,
                maximum: self.maximum_publishing_interval,
            });
        }
        if self.default_publishing_interval < self.minimum_publishing_interval
            || self.default_publishing_interval > self.maximum_publishing_interval
        {
            return Err(ConfigError::DefaultOutOfRange {
                default: self.default_publishing_interval,
                minimum: self.minimum_publishing_interval,
                maximum: self.maximum_publishing_interval,
            });
        }
        Ok(())
    }

    /// spec §3/§4.4: the bound the engine enforces on the shared request queue.
    pub fn max_publish_request_in_queue(&self, subscription_count: usize) -> usize {
        self.max_publish_request_in_queue.unwrap_or_else(|| {
            (subscription_count * 2).max(constants::MIN_PUBLISH_REQUEST_IN_QUEUE)
        })
    }

    /// spec §3: "publishingInterval >= minimumPublishingInterval ... value in
    /// source is clamped".
    pub fn clamp_publishing_interval(&self, requested: i64) -> i64 {
        requested.clamp(self.minimum_publishing_interval, self.maximum_publishing_interval)
    }

    pub fn retransmission_queue_cap(&self, max_notifications_per_publish: usize, max_keep_alive_count: u32) -> usize {
        self.max_retransmission_queue_size.unwrap_or_else(|| {
            let computed = max_notifications_per_publish.max(1) * max_keep_alive_count as usize;
            computed.min(constants::RETRANSMISSION_QUEUE_HARD_CAP)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_min_above_max() {
        let config = PublishEngineConfig { minimum_publishing_interval: 2000, maximum_publishing_interval: 1000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::MinExceedsMax { .. })));
    }

    #[test]
    fn rejects_default_out_of_range() {
        let config = PublishEngineConfig { default_publishing_interval: 10, minimum_publishing_interval: 50, maximum_publishing_interval: 1000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::DefaultOutOfRange { .. })));
    }

    #[test]
    fn dynamic_queue_bound_follows_subscription_count() {
        let config = PublishEngineConfig { max_publish_request_in_queue: None, ..Default::default() };
        assert_eq!(config.max_publish_request_in_queue(0), 4);
        assert_eq!(config.max_publish_request_in_queue(10), 20);
    }
}
