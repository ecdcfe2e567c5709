//! Consumer-side pull proxy: buffers fanned-out events in a private FIFO
//! for on-demand retrieval.
//!
//! `pull` parks the caller on a notify signal until an event is buffered
//! or the proxy disconnects; there is no busy-wait. The `Notified` future
//! is armed before the buffer recheck, so an enqueue or disconnect racing
//! with the recheck cannot lose the wakeup.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::admin::ConsumerAdmin;
use crate::comm::{PullConsumer, PullSupplier};
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;
use crate::proxy::{Link, ProxyState};

pub struct ProxyPullSupplier {
    id: Uuid,
    link: Mutex<Link<dyn PullConsumer>>,
    admin: Weak<ConsumerAdmin>,
    buffer: Mutex<VecDeque<Event>>,
    available: Notify,
}

impl ProxyPullSupplier {
    pub(crate) fn new(admin: Weak<ConsumerAdmin>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            link: Mutex::new(Link::new()),
            admin,
            buffer: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProxyState {
        self.link.lock().unwrap().state
    }

    /// Binds the pull consumer. The handle is optional: a consumer that
    /// never needs the teardown notification may connect anonymously.
    pub fn connect_pull_consumer(
        self: &Arc<Self>,
        consumer: Option<Arc<dyn PullConsumer>>,
    ) -> ChannelResult<()> {
        let connection_id = self.link.lock().unwrap().connect(consumer)?;
        if let Some(admin) = self.admin.upgrade() {
            admin.insert_pull_supplier(self.clone());
        }
        debug!(proxy = %self.id, connection = %connection_id, "pull consumer connected");
        Ok(())
    }

    /// Blocks until an event is buffered, or fails with `Disconnected`
    /// once the proxy is torn down.
    pub async fn pull(&self) -> ChannelResult<Event> {
        loop {
            let notified = self.available.notified();
            if !self.link.lock().unwrap().is_connected() {
                return Err(ChannelError::Disconnected);
            }
            if let Some(event) = self.buffer.lock().unwrap().pop_front() {
                return Ok(event);
            }
            notified.await;
        }
    }

    /// Drains at most one buffered event without blocking. `None` is a
    /// normal result, not a failure.
    pub fn try_pull(&self) -> ChannelResult<Option<Event>> {
        if !self.link.lock().unwrap().is_connected() {
            return Err(ChannelError::Disconnected);
        }
        Ok(self.buffer.lock().unwrap().pop_front())
    }

    pub async fn disconnect_pull_supplier(&self) {
        let peer = self.link.lock().unwrap().clear();
        self.buffer.lock().unwrap().clear();
        self.available.notify_waiters();
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_pull_supplier(self.id);
        }
        if let Some(consumer) = peer {
            consumer.disconnect_pull_consumer().await;
            debug!(proxy = %self.id, "pull supplier disconnected");
        }
    }

    pub async fn destroy(&self) {
        let peer = {
            let mut link = self.link.lock().unwrap();
            if link.state == ProxyState::Destroyed {
                return;
            }
            let peer = link.clear();
            link.state = ProxyState::Destroyed;
            peer
        };
        self.buffer.lock().unwrap().clear();
        self.available.notify_waiters();
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_pull_supplier(self.id);
        }
        if let Some(consumer) = peer {
            consumer.disconnect_pull_consumer().await;
        }
        debug!(proxy = %self.id, "pull supplier destroyed");
    }

    /// Appends one fanned-out event to the FIFO. Events arriving while the
    /// proxy is unconnected are dropped, matching the snapshot semantics of
    /// the push side.
    pub(crate) fn enqueue(&self, event: Event) {
        if !self.link.lock().unwrap().is_connected() {
            return;
        }
        self.buffer.lock().unwrap().push_back(event);
        self.available.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

#[async_trait]
impl PullSupplier for ProxyPullSupplier {
    async fn pull(&self) -> ChannelResult<Event> {
        ProxyPullSupplier::pull(self).await
    }

    async fn try_pull(&self) -> ChannelResult<Option<Event>> {
        ProxyPullSupplier::try_pull(self)
    }

    async fn disconnect_pull_supplier(&self) {
        ProxyPullSupplier::disconnect_pull_supplier(self).await;
    }
}
