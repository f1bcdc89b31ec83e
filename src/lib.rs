pub mod bridge;
pub mod contacts;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod names;
pub mod phone;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod similarity;
pub mod transcript;
pub mod transport;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use bridge::MessageBridge;
pub use error::{BridgeError, SelectionError, SendError, StoreError};
