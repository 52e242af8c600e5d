//! Shared types and error utilities used across all aviary crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
