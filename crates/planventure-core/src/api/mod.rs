//! REST API client module for the Planventure service.
//!
//! This module provides the `ApiClient` for calling the Planventure API
//! with the session's bearer token, and the `ApiError` taxonomy every
//! failed call is classified into.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind};
