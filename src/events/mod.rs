// Events module - NOTIFICATION
// Ownership events and their post-commit delivery to subscribers

mod emitter;
mod event;

pub use emitter::{
    ChannelSubscriber, DeadLetter, EmitError, EmitterConfig, EmitterStats, EventEmitter,
    EventQueue, EventSubscriber, LogSubscriber, MockSubscriber,
};
pub use event::OwnershipChanged;
