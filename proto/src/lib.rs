pub mod codec;
pub mod entity;
pub mod entity_id;
pub mod error;
pub mod log;
pub mod notification;
pub mod schema;
pub mod snapshot;
pub mod value;

pub use codec::{decode, encode};
pub use entity::{Entity, FieldCell};
pub use entity_id::EntityId;
pub use error::DecodeError;
pub use log::{LogLevel, LogRecord};
pub use notification::{Notification, SubscriptionConfig};
pub use schema::{EntitySchema, FieldSchema};
pub use snapshot::StoreSnapshot;
pub use value::{Value, ValueType};
