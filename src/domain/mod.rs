//! Domain model: table state value objects and the three message families
//! (commands, events, domain errors) the reconciliation bus moves around.

mod commands;
mod events;
mod faults;
mod values;

pub use commands::Command;
pub use events::Event;
pub use faults::DomainError;
pub use values::{SchemaField, TableConfig, TableMetadata};

/// Any message the bus can dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Command(Command),
    Event(Event),
    Error(DomainError),
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<DomainError> for Message {
    fn from(error: DomainError) -> Self {
        Self::Error(error)
    }
}
