//! Provider adapter layer
//!
//! Translates the gateway's normalized request shape onto each upstream
//! wire protocol and back. One adapter per provider type; dispatch is a
//! table keyed by the catalog's closed type set.

mod adapter;
mod error;
mod protocol;
mod rotation;
mod types;

pub use adapter::{Adapter, AdapterCapabilities, AdapterRegistry, CallContext};
pub use error::AdapterError;
pub use types::{
    ChunkStream, Content, ContentPart, InvokeRequest, InvokeResponse, MediaRef, Message, Role, StreamChunk, Usage,
    effective_parameters, merge_parameters,
};
