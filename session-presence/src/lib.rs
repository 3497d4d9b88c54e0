//! Multi-context session presence: lets every tab of one logical session
//! detect its peers, agree on whether the session is still occupied, and
//! converge on a single teardown decision without a central coordinator.

pub mod channel;
pub mod config;
pub mod engine;
pub mod errors;
pub mod host;
pub mod lifecycle;
pub mod message;
pub mod registry;
pub mod session;
pub mod store;
pub mod terminate;

pub use channel::ChannelHub;
pub use config::PresenceConfig;
pub use engine::{PresenceEngine, PresenceHandle};
pub use host::{AutoConfirm, EntryRedirect, LogRedirect, UserPrompt};
pub use message::PresenceMessage;
pub use registry::PeerRegistry;
pub use session::Session;
pub use store::{FactStore, FileStore, MemoryStore};
pub use terminate::{HttpTerminator, NoopTerminator, SessionTerminator};
