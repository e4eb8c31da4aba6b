//! Router engine
//!
//! Two entry shapes: direct (the caller names provider and model) and
//! tag-routed (the caller supplies a query). Both funnel through the same
//! pipeline: authorize, acquire a rate token, invoke the adapter, enqueue
//! an invocation record, respond.

mod engine;
mod error;
mod recording;
mod select;


pub use engine::RouterEngine;
pub use error::RouterError;
pub use select::select_candidate;
