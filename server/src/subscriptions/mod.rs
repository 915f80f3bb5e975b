//! The Publish Engine: everything described in spec §4 lives under this
//! module, split the way the spec's own component table (§2) splits it.

pub mod notification_source;
pub mod publish_engine;
pub mod publish_request_queue;
pub mod subscription;

pub use notification_source::{test_support, NotificationSource};
pub use publish_engine::{PublishEngine, PublishOutcome};
pub use publish_request_queue::{PublishRequestQueue, QueuedRequest};
pub use subscription::{Subscription, SubscriptionAction, SubscriptionState};
