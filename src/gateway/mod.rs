//! Gateway implementation

mod builder;
mod router;

pub use builder::{DEFAULT_CALL_TIMEOUT, Muninn, MuninnBuilder};
pub use router::Gateway;
