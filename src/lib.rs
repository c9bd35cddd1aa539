// CarStore - Rental car inventory with a file-based command protocol

pub mod codec;
pub mod config;
pub mod jsonl;
pub mod protocol;
pub mod query;
pub mod seed;
pub mod service;
pub mod store;
pub mod transport;
pub mod vehicle;

// Re-export main types for convenience
pub use config::Config;
pub use protocol::{Action, Command, DispatchError, Response, Status, dispatch};
pub use query::{FilterCriteria, SearchField, SortKey};
pub use service::{Backoff, DedupGuard, Service, Step};
pub use store::{Format, Inventory};
pub use transport::{ChannelClient, ChannelTransport, FileTransport, Inbound, Transport, channel};
pub use vehicle::Vehicle;
