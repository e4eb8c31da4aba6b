mod request;
mod response;
mod stream;

pub use request::{Content, ContentPart, InvokeRequest, MediaRef, Message, Role, effective_parameters, merge_parameters};
pub use response::{InvokeResponse, Usage};
pub use stream::{ChunkStream, StreamChunk};
