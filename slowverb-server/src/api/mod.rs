//! HTTP API handlers for slowverb-server

pub mod health;
pub mod submit;

pub use health::health_routes;
pub use submit::submit_routes;
