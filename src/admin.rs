//! # Admin objects
//!
//! Factories that mint proxies on demand and track the live set of proxies
//! they created. The live sets are the only structures mutated by multiple
//! callers concurrently; each is guarded by a single mutex with the
//! copy-under-lock / iterate-without-lock discipline: fan-out snapshots and
//! teardown copy the set while holding the lock, then work on the copy with
//! the lock released. No lock spans two admins or two channels.
//!
//! [`ConsumerAdmin::deliver`] is the fan-out task body: one delivery
//! subtask per push supplier in the snapshot, then a FIFO append for every
//! connected pull supplier. Proxies obtained after the snapshot do not see
//! the event; proxies disconnecting mid-flight receive it best-effort.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::PullConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ChannelError, ChannelResult};
use crate::event::Event;
use crate::proxy::{ProxyPullConsumer, ProxyPullSupplier, ProxyPushConsumer, ProxyPushSupplier};

/// Mints consumer-side proxies (push and pull suppliers) and owns their
/// live sets.
pub struct ConsumerAdmin {
    push_suppliers: Mutex<HashMap<Uuid, Arc<ProxyPushSupplier>>>,
    pull_suppliers: Mutex<HashMap<Uuid, Arc<ProxyPullSupplier>>>,
    dispatcher: Arc<Dispatcher>,
}

impl ConsumerAdmin {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, estimated_consumers: usize) -> Arc<Self> {
        Arc::new(Self {
            push_suppliers: Mutex::new(HashMap::with_capacity(estimated_consumers)),
            pull_suppliers: Mutex::new(HashMap::with_capacity(estimated_consumers)),
            dispatcher,
        })
    }

    /// Creates a new unconnected push-supplier proxy and registers it.
    pub fn obtain_push_supplier(self: &Arc<Self>) -> Arc<ProxyPushSupplier> {
        let proxy = ProxyPushSupplier::new(Arc::downgrade(self));
        self.push_suppliers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy.clone());
        debug!(proxy = %proxy.id(), "push supplier obtained");
        proxy
    }

    /// Creates a new unconnected pull-supplier proxy and registers it.
    pub fn obtain_pull_supplier(self: &Arc<Self>) -> Arc<ProxyPullSupplier> {
        let proxy = ProxyPullSupplier::new(Arc::downgrade(self));
        self.pull_suppliers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy.clone());
        debug!(proxy = %proxy.id(), "pull supplier obtained");
        proxy
    }

    /// Queues the fan-out task for one published event. Returns as soon as
    /// the task is accepted by the dispatch engine.
    pub(crate) fn publish(self: &Arc<Self>, event: Event) -> ChannelResult<()> {
        let admin = self.clone();
        self.dispatcher
            .submit(Box::pin(async move { admin.deliver(event).await }))
    }

    /// Fan-out task body: delivery targets are exactly the snapshot taken
    /// here.
    pub(crate) async fn deliver(self: &Arc<Self>, event: Event) {
        let push_snapshot: Vec<Arc<ProxyPushSupplier>> = {
            let suppliers = self.push_suppliers.lock().unwrap();
            suppliers.values().cloned().collect()
        };
        trace!(event = %event.id(), targets = push_snapshot.len(), "fanning out");

        for supplier in push_snapshot {
            let subtask = {
                let supplier = supplier.clone();
                let event = event.clone();
                Box::pin(async move {
                    supplier.deliver(event).await;
                })
            };
            match self.dispatcher.submit(subtask) {
                Ok(()) => {}
                // A full backlog only delays this event; run the delivery
                // inline instead of dropping the remaining targets.
                Err(ChannelError::Congested) => supplier.deliver(event.clone()).await,
                // The queue is closed: the channel is going away.
                Err(_) => return,
            }
        }

        let pull_snapshot: Vec<Arc<ProxyPullSupplier>> = {
            let suppliers = self.pull_suppliers.lock().unwrap();
            suppliers.values().cloned().collect()
        };
        for supplier in pull_snapshot {
            supplier.enqueue(event.clone());
        }
    }

    /// Re-registers a proxy on reconnect. Insertion is keyed by proxy id,
    /// so a proxy already present is a no-op.
    pub(crate) fn insert_push_supplier(&self, proxy: Arc<ProxyPushSupplier>) {
        self.push_suppliers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy);
    }

    pub(crate) fn insert_pull_supplier(&self, proxy: Arc<ProxyPullSupplier>) {
        self.pull_suppliers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy);
    }

    /// Idempotent: removing an absent proxy is a no-op, because a proxy's
    /// own disconnect can race a mass-destroy.
    pub(crate) fn remove_push_supplier(&self, id: Uuid) {
        self.push_suppliers.lock().unwrap().remove(&id);
    }

    pub(crate) fn remove_pull_supplier(&self, id: Uuid) {
        self.pull_suppliers.lock().unwrap().remove(&id);
    }

    pub fn push_supplier_count(&self) -> usize {
        self.push_suppliers.lock().unwrap().len()
    }

    pub fn pull_supplier_count(&self) -> usize {
        self.pull_suppliers.lock().unwrap().len()
    }

    /// Destroys every owned proxy. The sets are snapshotted and cleared
    /// under the lock, then each proxy is destroyed with the lock released
    /// so that self-removal during the cascade cannot deadlock.
    pub(crate) async fn destroy(&self) {
        let push_snapshot: Vec<_> = {
            let mut suppliers = self.push_suppliers.lock().unwrap();
            suppliers.drain().map(|(_, proxy)| proxy).collect()
        };
        for proxy in push_snapshot {
            proxy.destroy().await;
        }

        let pull_snapshot: Vec<_> = {
            let mut suppliers = self.pull_suppliers.lock().unwrap();
            suppliers.drain().map(|(_, proxy)| proxy).collect()
        };
        for proxy in pull_snapshot {
            proxy.destroy().await;
        }
        debug!("consumer admin destroyed");
    }
}

/// Mints supplier-side proxies (push and pull consumers) and owns their
/// live sets.
pub struct SupplierAdmin {
    push_consumers: Mutex<HashMap<Uuid, Arc<ProxyPushConsumer>>>,
    pull_consumers: Mutex<HashMap<Uuid, Arc<ProxyPullConsumer>>>,
    consumer_admin: Arc<ConsumerAdmin>,
    pull_config: PullConfig,
}

impl SupplierAdmin {
    pub(crate) fn new(
        consumer_admin: Arc<ConsumerAdmin>,
        pull_config: PullConfig,
        estimated_consumers: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            push_consumers: Mutex::new(HashMap::with_capacity(estimated_consumers)),
            pull_consumers: Mutex::new(HashMap::with_capacity(estimated_consumers)),
            consumer_admin,
            pull_config,
        })
    }

    /// Creates a new unconnected push-consumer proxy and registers it.
    pub fn obtain_push_consumer(self: &Arc<Self>) -> Arc<ProxyPushConsumer> {
        let proxy = ProxyPushConsumer::new(Arc::downgrade(self), self.consumer_admin.clone());
        self.push_consumers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy.clone());
        debug!(proxy = %proxy.id(), "push consumer obtained");
        proxy
    }

    /// Creates a new unconnected pull-consumer proxy and registers it.
    pub fn obtain_pull_consumer(self: &Arc<Self>) -> Arc<ProxyPullConsumer> {
        let proxy = ProxyPullConsumer::new(
            Arc::downgrade(self),
            self.consumer_admin.clone(),
            self.pull_config.clone(),
        );
        self.pull_consumers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy.clone());
        debug!(proxy = %proxy.id(), "pull consumer obtained");
        proxy
    }

    pub(crate) fn insert_push_consumer(&self, proxy: Arc<ProxyPushConsumer>) {
        self.push_consumers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy);
    }

    pub(crate) fn insert_pull_consumer(&self, proxy: Arc<ProxyPullConsumer>) {
        self.pull_consumers
            .lock()
            .unwrap()
            .insert(proxy.id(), proxy);
    }

    pub(crate) fn remove_push_consumer(&self, id: Uuid) {
        self.push_consumers.lock().unwrap().remove(&id);
    }

    pub(crate) fn remove_pull_consumer(&self, id: Uuid) {
        self.pull_consumers.lock().unwrap().remove(&id);
    }

    pub fn push_consumer_count(&self) -> usize {
        self.push_consumers.lock().unwrap().len()
    }

    pub fn pull_consumer_count(&self) -> usize {
        self.pull_consumers.lock().unwrap().len()
    }

    pub(crate) async fn destroy(&self) {
        let push_snapshot: Vec<_> = {
            let mut consumers = self.push_consumers.lock().unwrap();
            consumers.drain().map(|(_, proxy)| proxy).collect()
        };
        for proxy in push_snapshot {
            proxy.destroy().await;
        }

        let pull_snapshot: Vec<_> = {
            let mut consumers = self.pull_consumers.lock().unwrap();
            consumers.drain().map(|(_, proxy)| proxy).collect()
        };
        for proxy in pull_snapshot {
            proxy.destroy().await;
        }
        debug!("supplier admin destroyed");
    }
}
