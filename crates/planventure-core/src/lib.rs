//! Planventure client core.
//!
//! Session management, the authenticated API client, and route gating for
//! the Planventure trip planner. Front ends (the `planventure` CLI, or any
//! other view layer) own a single [`SessionManager`] and hand it to the
//! [`ApiClient`] and [`RouteGate`] they construct.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routing;

pub use api::{ApiClient, ApiError, ErrorKind};
pub use auth::{CredentialStore, Session, SessionError, SessionManager};
pub use config::Config;
pub use routing::{GateDecision, Gated, History, Navigator, RouteGate, LOGIN_ROUTE};
