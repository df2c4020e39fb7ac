pub mod bus;
pub mod event;

pub use bus::{BusStats, EventBus, EventWriter, HandlerResult, SubscriptionId};
pub use event::{Event, EventKind, EventPayload, EventPriority};
