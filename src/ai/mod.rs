//! Remote AI decisions: request bookkeeping, wire protocol, transports

pub mod actions;
pub mod coordinator;
pub mod protocol;
pub mod service;
pub mod snapshot;
pub mod transport;

pub use coordinator::{AiCoordinator, AiMetrics, PendingRequest};
pub use protocol::{AiAction, DecisionRequest, DecisionResponse};
pub use service::{AiService, LinkHealth, ServiceHandle};
pub use snapshot::{GameSnapshot, UnitSnapshot};
pub use transport::{DecisionTransport, HttpTransport, ScriptedTransport};
