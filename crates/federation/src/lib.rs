//! Protocol federation fabric: uniform request/response routing across
//! heterogeneous protocol backends, a bounded best-effort event bus, and
//! data translators for reshaping payloads between protocol dialects.

pub mod event_bus;
pub mod fabric;
pub mod protocol;
pub mod translator;

pub use event_bus::{EventBus, EventHandler};
pub use fabric::ProtocolFabric;
pub use protocol::{FederatedEvent, FederatedProtocol, FederatedRequest, FederatedResponse};
pub use translator::{translate, TranslationRule, Transform};
