//! Supplier-side push proxy: accepts pushed events and forwards them into
//! the channel's fan-out path.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::admin::{ConsumerAdmin, SupplierAdmin};
use crate::comm::{PushConsumer, PushSupplier};
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;
use crate::proxy::{Link, ProxyState};

pub struct ProxyPushConsumer {
    id: Uuid,
    link: Mutex<Link<dyn PushSupplier>>,
    admin: Weak<SupplierAdmin>,
    consumer_admin: Arc<ConsumerAdmin>,
}

impl ProxyPushConsumer {
    pub(crate) fn new(admin: Weak<SupplierAdmin>, consumer_admin: Arc<ConsumerAdmin>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            link: Mutex::new(Link::new()),
            admin,
            consumer_admin,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProxyState {
        self.link.lock().unwrap().state
    }

    /// Binds the supplier side of the connection. The supplier handle is
    /// optional: a supplier that never needs the teardown notification may
    /// connect anonymously.
    pub fn connect_push_supplier(
        self: &Arc<Self>,
        supplier: Option<Arc<dyn PushSupplier>>,
    ) -> ChannelResult<()> {
        let connection_id = self.link.lock().unwrap().connect(supplier)?;
        if let Some(admin) = self.admin.upgrade() {
            admin.insert_push_consumer(self.clone());
        }
        debug!(proxy = %self.id, connection = %connection_id, "push supplier connected");
        Ok(())
    }

    /// Accepts one event and hands it to the dispatch engine. Returns as
    /// soon as the fan-out task is queued; delivery failures are handled
    /// inside the channel and never surface here.
    pub fn push(&self, event: Event) -> ChannelResult<()> {
        if !self.link.lock().unwrap().is_connected() {
            return Err(ChannelError::Disconnected);
        }
        trace!(proxy = %self.id, event = %event.id(), "event queued for fan-out");
        self.consumer_admin.publish(event)
    }

    pub async fn disconnect_push_consumer(&self) {
        let peer = self.link.lock().unwrap().clear();
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_push_consumer(self.id);
        }
        if let Some(supplier) = peer {
            supplier.disconnect_push_supplier().await;
            debug!(proxy = %self.id, "push consumer disconnected");
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
            admin.remove_push_consumer(self.id);
        }
        if let Some(supplier) = peer {
            supplier.disconnect_push_supplier().await;
        }
        debug!(proxy = %self.id, "push consumer destroyed");
    }
}

#[async_trait]
impl PushConsumer for ProxyPushConsumer {
    async fn push(&self, event: Event) -> ChannelResult<()> {
        ProxyPushConsumer::push(self, event)
    }

    async fn disconnect_push_consumer(&self) {
        ProxyPushConsumer::disconnect_push_consumer(self).await;
    }
}
