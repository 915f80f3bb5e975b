//! The server-side Publish Engine: pairing long-polled `PublishRequest`s
//! with notifications produced by `Subscription`s, driving each
//! subscription's publishing state machine, and enforcing request-queue
//! limits and lifetime/keep-alive/timeout conditions.
//!
//! Transport framing and chunking, monitored-item evaluation, the address
//! space, and the rest of the service dispatcher are external collaborators
//! this crate never touches directly (spec §1).

pub mod config;
pub mod subscriptions;

pub use config::{ConfigError, PublishEngineConfig};
pub use subscriptions::{NotificationSource, PublishEngine, PublishOutcome, Subscription, SubscriptionAction, SubscriptionState};
