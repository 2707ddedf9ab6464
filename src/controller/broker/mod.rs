//! Cross-instance "a new revision exists" channel.
//!
//! The message itself carries no data; receivers re-read the store.

mod local_broker;
mod redis_broker;
pub use local_broker::*;
pub use redis_broker::*;

#[cfg(test)]
mod broker_test;

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Stream of update signals for one subscription. It ends (or yields an
/// error) when the underlying connection is lost.
pub type UpdateStream = BoxStream<'static, Result<()>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpdateBroker: Send + Sync + 'static {
    /// Announces a new revision to every subscribed controller instance.
    async fn publish(&self) -> Result<()>;

    /// Opens a fresh subscription.
    async fn subscribe(&self) -> Result<UpdateStream>;
}
