//! Session coordinator
//!
//! Maps each routing decision to its handler through an exhaustive match,
//! serializes requests per session id and bounds external calls with the
//! request deadline.

pub mod coordinator;
pub mod handlers;

pub use coordinator::{QueryRequest, SessionCoordinator};
