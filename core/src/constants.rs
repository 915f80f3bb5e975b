//! Default values called out by spec §3, §4.4 and §9. Kept as named
//! constants rather than inlined so the rationale in the doc comments
//! travels with the value.

/// spec §6: "`maxPublishRequestInQueue`: positive integer; default 100."
pub const DEFAULT_MAX_PUBLISH_REQUEST_IN_QUEUE: usize = 100;

/// spec §3: "PublishEngine owns ... `maxPublishRequestInQueue` (default
/// implementation uses max(subscriptionCount*2, 4))" — used when an engine
/// is constructed without an explicit override.
pub const MIN_PUBLISH_REQUEST_IN_QUEUE: usize = 4;

/// spec §3: "lifeTimeCount ... re-adjusted upward to at least 3 *
/// maxKeepAliveCount".
pub const MIN_LIFETIME_COUNT_RATIO: u32 = 3;

/// spec §9: "Pick an explicit cap (e.g. maxNotificationsPerPublish *
/// maxKeepAliveCount, else 1024)".
pub const RETRANSMISSION_QUEUE_HARD_CAP: usize = 1024;

/// Pre-allocated capacity for a subscription's monitored item map, matching
/// this workspace's existing `DEFAULT_MONITORED_ITEM_CAPACITY` convention.
pub const DEFAULT_MONITORED_ITEM_CAPACITY: usize = 32;
