//! The agent process: registers with the controller once, then long-polls
//! for new revisions and relays each one to its local worker.
//!
//! Identity, last seen tag and the cached document are persisted after every
//! change so a restart neither re-registers nor re-downloads a known
//! revision.

mod client;
mod runtime;
mod state;
pub use client::*;
pub use runtime::*;
pub use state::*;

#[cfg(test)]
mod client_test;
