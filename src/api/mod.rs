pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::api_router;
pub use types::{ApiContext, PhwIdentity, PhwRegistry};
