//! # Proxy objects
//!
//! Each proxy mediates one side of one logical connection between the
//! channel and a peer. All four variants share the same lifecycle:
//!
//! ```text
//! UNCONNECTED --connect--> CONNECTED --disconnect--> UNCONNECTED
//!       \                      |
//!        \--destroy--> DESTROYED <--destroy (terminal, idempotent)
//! ```
//!
//! A proxy holds at most one peer; a second connect while CONNECTED fails
//! with `AlreadyConnected`. Disconnect notifies the peer's own disconnect
//! hook best-effort, clears the peer and removes the proxy from the admin
//! that minted it. Data-plane operations on an UNCONNECTED or DESTROYED
//! proxy fail with `Disconnected`.

mod pull_consumer;
mod pull_supplier;
mod push_consumer;
mod push_supplier;

pub use pull_consumer::ProxyPullConsumer;
pub use pull_supplier::ProxyPullSupplier;
pub use push_consumer::ProxyPushConsumer;
pub use push_supplier::ProxyPushSupplier;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ChannelError, ChannelResult};

/// Connection lifecycle state of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Unconnected,
    Connected,
    Destroyed,
}

/// The mutable connection cell every proxy guards with a single mutex:
/// lifecycle state, the optional bound peer and the identity assigned to
/// the current connection.
pub(crate) struct Link<P: ?Sized> {
    pub(crate) state: ProxyState,
    pub(crate) peer: Option<Arc<P>>,
    pub(crate) connection_id: Option<Uuid>,
}

impl<P: ?Sized> Link<P> {
    pub(crate) fn new() -> Self {
        Self {
            state: ProxyState::Unconnected,
            peer: None,
            connection_id: None,
        }
    }

    /// Transitions UNCONNECTED → CONNECTED, storing the peer and minting a
    /// connection id.
    pub(crate) fn connect(&mut self, peer: Option<Arc<P>>) -> ChannelResult<Uuid> {
        match self.state {
            ProxyState::Destroyed => Err(ChannelError::Disconnected),
            ProxyState::Connected => Err(ChannelError::AlreadyConnected),
            ProxyState::Unconnected => {
                let connection_id = Uuid::new_v4();
                self.peer = peer;
                self.connection_id = Some(connection_id);
                self.state = ProxyState::Connected;
                Ok(connection_id)
            }
        }
    }

    /// Clears the link, returning the peer whose disconnect hook is owed a
    /// notification. DESTROYED stays terminal.
    pub(crate) fn clear(&mut self) -> Option<Arc<P>> {
        if self.state == ProxyState::Connected {
            self.state = ProxyState::Unconnected;
        }
        self.connection_id = None;
        self.peer.take()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == ProxyState::Connected
    }
}
