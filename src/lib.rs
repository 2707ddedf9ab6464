//! Versioned configuration distribution.
//!
//! An admin saves a JSON document on a [`controller`], which versions it,
//! announces the change on an update broker and wakes every agent watch
//! parked on it. Each [`agent`] keeps its identity and last document on
//! disk, relays every change to its local [`worker`], and the worker serves
//! the document to clients.

mod config;
mod errors;
mod types;

pub mod agent;
pub mod constants;
pub mod controller;
pub mod metrics;
pub mod network;
pub mod storage;
pub mod utils;
pub mod worker;

pub use config::*;
pub use errors::*;
pub use types::*;
