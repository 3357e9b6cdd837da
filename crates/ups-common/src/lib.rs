#![doc = "Common types shared across the upspico workspace."]

pub mod config;
pub mod error;
pub mod state;

pub use config::*;
pub use error::*;
pub use state::*;
