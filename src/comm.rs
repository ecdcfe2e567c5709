//! # Capability roles
//!
//! The four minimal operation sets a peer must support to take part in a
//! connection, one per direction and delivery discipline. Proxies accept
//! peers as trait objects, so role conformance is checked by the type
//! system at the connection seam.
//!
//! The proxy variants in [`crate::proxy`] implement the matching role
//! themselves, which allows channels to be chained (a proxy of one channel
//! connected as the peer of another).

use async_trait::async_trait;

use crate::error::ChannelResult;
use crate::event::Event;

/// A peer that receives events pushed to it.
#[async_trait]
pub trait PushConsumer: Send + Sync {
    /// Receives one event.
    ///
    /// Delivery subtasks classify the returned error to decide whether the
    /// consumer is removed from the channel: `Disconnected` / `Unreachable`
    /// trigger a full disconnect, `Transient` a silent removal.
    async fn push(&self, event: Event) -> ChannelResult<()>;

    /// Notification that the supplier side is going away. Best-effort.
    async fn disconnect_push_consumer(&self);
}

/// A peer that pushes events and only needs to learn about teardown.
#[async_trait]
pub trait PushSupplier: Send + Sync {
    async fn disconnect_push_supplier(&self);
}

/// A peer that hands out events on demand.
#[async_trait]
pub trait PullSupplier: Send + Sync {
    /// Blocks until an event is available or the supplier disconnects.
    async fn pull(&self) -> ChannelResult<Event>;

    /// Never blocks; `None` means no event was available, which is a
    /// normal result rather than a failure.
    async fn try_pull(&self) -> ChannelResult<Option<Event>>;

    async fn disconnect_pull_supplier(&self);
}

/// A peer that polls for events and only needs to learn about teardown.
#[async_trait]
pub trait PullConsumer: Send + Sync {
    async fn disconnect_pull_consumer(&self);
}
