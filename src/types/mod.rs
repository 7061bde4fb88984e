//! Public types for the Muninn API.

mod context;
mod message;
mod request;
mod response;

pub use context::RequestContext;
pub use message::{Message, Role};
pub use request::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, ModelRequest, ModelType, TaskType,
};
pub use response::{
    Completion, ERROR_MODEL, EXHAUSTED_MESSAGE, Embedding, ModelResponse, ProviderStatus,
};
