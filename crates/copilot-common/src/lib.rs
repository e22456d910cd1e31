pub mod errors;
pub mod events;
pub mod id;

pub use errors::ConfigError;
pub use events::{BridgeEvent, EventBus};
pub use id::{new_id, new_request_id, ConversationId};

pub type Result<T> = std::result::Result<T, ConfigError>;
