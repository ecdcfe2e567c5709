//! Consumer-side push proxy: delivers fanned-out events to one bound
//! [`PushConsumer`] and heals the channel's membership when that consumer
//! fails.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::admin::ConsumerAdmin;
use crate::comm::{PushConsumer, PushSupplier};
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;
use crate::proxy::{Link, ProxyState};

pub struct ProxyPushSupplier {
    id: Uuid,
    link: Mutex<Link<dyn PushConsumer>>,
    admin: Weak<ConsumerAdmin>,
}

impl ProxyPushSupplier {
    pub(crate) fn new(admin: Weak<ConsumerAdmin>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            link: Mutex::new(Link::new()),
            admin,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProxyState {
        self.link.lock().unwrap().state
    }

    /// Binds the push consumer this proxy will deliver to.
    pub fn connect_push_consumer(
        self: &Arc<Self>,
        consumer: Arc<dyn PushConsumer>,
    ) -> ChannelResult<()> {
        let connection_id = self.link.lock().unwrap().connect(Some(consumer))?;
        if let Some(admin) = self.admin.upgrade() {
            admin.insert_push_supplier(self.clone());
        }
        debug!(proxy = %self.id, connection = %connection_id, "push consumer connected");
        Ok(())
    }

    /// Idempotent teardown: notifies the consumer best-effort, clears the
    /// peer and removes this proxy from the admin's live set.
    pub async fn disconnect_push_supplier(&self) {
        let peer = self.link.lock().unwrap().clear();
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_push_supplier(self.id);
        }
        if let Some(consumer) = peer {
            consumer.disconnect_push_consumer().await;
            debug!(proxy = %self.id, "push supplier disconnected");
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
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_push_supplier(self.id);
        }
        if let Some(consumer) = peer {
            consumer.disconnect_push_consumer().await;
        }
        debug!(proxy = %self.id, "push supplier destroyed");
    }

    /// One delivery subtask: pushes `event` to the bound consumer and
    /// classifies the outcome.
    ///
    /// A consumer reporting `Disconnected` or `Unreachable` is confirmed
    /// gone and is disconnected (peer hook invoked). A `Transient` failure
    /// evicts the proxy from the live set without the peer hook — the
    /// peer's own lifecycle owns re-registration. Anything else is logged
    /// and the consumer kept; no delivery is retried.
    pub(crate) async fn deliver(&self, event: Event) {
        let consumer = {
            let link = self.link.lock().unwrap();
            if !link.is_connected() {
                return;
            }
            link.peer.clone()
        };
        let Some(consumer) = consumer else {
            return;
        };

        match consumer.push(event.clone()).await {
            Ok(()) => {
                trace!(proxy = %self.id, event = %event.id(), "event delivered");
            }
            Err(ChannelError::Disconnected) | Err(ChannelError::Unreachable(_)) => {
                warn!(proxy = %self.id, "consumer gone, disconnecting");
                self.disconnect_push_supplier().await;
            }
            Err(ChannelError::Transient(reason)) => {
                warn!(proxy = %self.id, %reason, "consumer unavailable, evicting");
                self.evict();
            }
            Err(e) => {
                warn!(proxy = %self.id, error = %e, "delivery failed, keeping consumer");
            }
        }
    }

    /// Removal without the peer notification path.
    fn evict(&self) {
        {
            let mut link = self.link.lock().unwrap();
            link.clear();
        }
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_push_supplier(self.id);
        }
    }
}

#[async_trait]
impl PushSupplier for ProxyPushSupplier {
    async fn disconnect_push_supplier(&self) {
        ProxyPushSupplier::disconnect_push_supplier(self).await;
    }
}
