//! HTTP plumbing shared by the controller and the worker.
//!
//! Authentication resolves a bearer token to a [`Principal`] that is threaded
//! through the filter chain into each handler; errors cross the HTTP boundary
//! through a single mapping so every endpoint answers with the same status
//! codes and bodies.

mod auth;
mod http;
pub use auth::*;
pub use http::*;

#[cfg(test)]
mod http_test;
