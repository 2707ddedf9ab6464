//! The controller: versioned config store front-end, agent registry and the
//! long-poll watch engine.
//!
//! A save goes through [`ConfigService`] (dedup + versioning), is announced
//! on the [`UpdateBroker`], and every controller instance's [`BrokerBridge`]
//! turns the broker message into a local fan-out on its
//! [`LongPollNotifier`], which wakes the watch requests parked on it.

mod agent_service;
mod bridge;
pub mod broker;
mod builder;
mod config_service;
mod notifier;
mod routes;
mod watch;

pub use agent_service::*;
pub use bridge::*;
pub use broker::*;
pub use builder::*;
pub use config_service::*;
pub use notifier::*;
pub use routes::*;
pub use watch::*;

#[cfg(test)]
mod config_service_test;
