// Library exports for testing and reuse

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
