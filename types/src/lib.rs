//! Wire-level shapes consumed and produced by the server-side Publish Engine.
//!
//! This is a deliberately narrow slice of the full OPC UA type system: only
//! the types named in the Publish Engine's external contract (spec §6) are
//! represented. Binary/XML/JSON encoding, the address space, and the
//! thousands of auto-generated object-type descriptors are out of scope.

pub mod date_time;
pub mod notification;
pub mod publish;
pub mod request_header;
pub mod response_header;
pub mod status_code;
pub mod variant;

pub use date_time::DateTime;
pub use notification::{MonitoredItemNotification, NotificationData, NotificationMessage, StatusChangeNotification};
pub use publish::{PublishRequest, PublishResponse, ServiceFault, SubscriptionAcknowledgement};
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use status_code::StatusCode;
pub use variant::{DataValue, Variant};
