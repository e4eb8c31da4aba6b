//! Shared building blocks for the gateway crates
//!
//! Keeps the HTTP error contract and deadline handling in one place so
//! feature crates stay decoupled from the server layer.

mod deadline;
mod error;

pub use deadline::Deadline;
pub use error::HttpError;
