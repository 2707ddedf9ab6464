//! The worker: holds the last configuration its agent relayed and serves it
//! to downstream clients.

mod cache;
mod routes;
mod server;

pub use cache::*;
pub use routes::*;
pub use server::*;

#[cfg(test)]
mod cache_test;
