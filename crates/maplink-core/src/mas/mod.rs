//! MAS instances, their registry and event notification.

mod events;
mod instance;
mod mns;
mod registry;

pub use events::{AccountKey, EventKind, MapEvent, StoreEvent};
pub use instance::{InstanceKind, InstanceState, MasInstance, SUPPORTED_FEATURES, SdpRecord};
pub use mns::{Notification, NotificationClient, NotificationHub};
pub use registry::{MasRegistry, MasRegistryBuilder, SMS_MMS_INSTANCE_ID};
