pub mod bus;
pub mod config;
pub mod error;

pub use bus::{CompletionStream, FredMessageBus, MessageBus};
pub use config::BusConfig;
pub use error::BusError;
