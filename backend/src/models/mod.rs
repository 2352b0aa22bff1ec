//! Data models shared across persistence, the lifecycle service, and API handlers.

pub mod request;
pub mod user;
