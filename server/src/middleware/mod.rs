pub mod auth;
pub mod cors;

pub use auth::{bearer_auth_middleware, AuthPolicy};
pub use cors::cors;
