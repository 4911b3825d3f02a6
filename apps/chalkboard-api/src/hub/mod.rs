pub mod events;
pub mod fanout;
pub mod registry;
pub mod server;
pub mod subscriber;

pub use events::{Event, EventKind};
pub use fanout::{HubClosed, HubConfig, HubHandle, HubStats};
