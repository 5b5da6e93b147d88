//! Tutor API Library Crate
//!
//! The HTTP face of the tutor: configuration, shared state, the five
//! tutoring endpoints and the router that serves them alongside the OpenAPI
//! documentation. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
