//! Navigation and route guarding.
//!
//! - `Navigator`: the handle through which redirects reach the active view
//! - `History`: a `Navigator` that records the current location
//! - `RouteGate`: decides whether protected content may render, from the
//!   session state alone

pub mod gate;
pub mod navigator;

pub use gate::{GateDecision, GateState, Gated, RouteGate};
pub use navigator::{History, Navigator, LOGIN_ROUTE};
