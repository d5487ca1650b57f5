pub mod consumers;
pub mod in_memory;
pub mod outbox_dispatcher;
pub mod topology;

pub use consumers::{PostingHandler, StageConsumer, StageHandler, ValidationHandler};
pub use in_memory::InMemoryBroker;
pub use outbox_dispatcher::OutboxDispatcher;
