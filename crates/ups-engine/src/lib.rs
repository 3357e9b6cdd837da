#![doc = "Protocol engine for the UPS Pico heartbeat/shutdown daemon."]

pub mod clock;
pub mod heartbeat;
pub mod monitor;
pub mod reporter;
pub mod service;
pub mod shutdown;

pub use clock::*;
pub use heartbeat::*;
pub use monitor::*;
pub use reporter::*;
pub use service::*;
pub use shutdown::*;
