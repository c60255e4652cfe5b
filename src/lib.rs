pub mod api;
pub mod client;
pub mod config;
pub mod net;
pub mod store;
pub mod types;

// Feature surfaces hanging off the client
pub mod features;
pub mod message;
pub mod receipt;
pub mod send;

// Frame dispatch and the concrete network implementations
pub mod handlers;
pub mod http;
pub mod transport;

// Scripted backends for tests and examples
pub mod test_utils;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
