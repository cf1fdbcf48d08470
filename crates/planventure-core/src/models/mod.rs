//! Data models exchanged with the Planventure API.
//!
//! Only the authentication payloads are typed here. Trip payloads are
//! passed through as opaque JSON by the front ends.

pub mod auth;

pub use auth::{AuthPayload, LoginRequest, RegisterRequest, UserProfile};
