//! Supplier-side pull proxy: actively polls a bound [`PullSupplier`] and
//! injects what it pulls into the same fan-out path as pushed events.
//!
//! One background task is spawned per connect, with a cancellation channel
//! minted for that connection alone. The task observes the signal in every
//! wait, so `disconnect_pull_consumer` stops it promptly even
//! mid-backoff-sleep, and a later reconnect can never rearm the flag of a
//! task left over from an earlier connection.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::admin::{ConsumerAdmin, SupplierAdmin};
use crate::comm::{PullConsumer, PullSupplier};
use crate::config::PullConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::proxy::{Link, ProxyState};

pub struct ProxyPullConsumer {
    id: Uuid,
    link: Mutex<Link<dyn PullSupplier>>,
    admin: Weak<SupplierAdmin>,
    consumer_admin: Arc<ConsumerAdmin>,
    config: PullConfig,
    /// Cancellation handle for the polling task of the current connection.
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl ProxyPullConsumer {
    pub(crate) fn new(
        admin: Weak<SupplierAdmin>,
        consumer_admin: Arc<ConsumerAdmin>,
        config: PullConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            link: Mutex::new(Link::new()),
            admin,
            consumer_admin,
            config,
            cancel: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProxyState {
        self.link.lock().unwrap().state
    }

    /// Binds the pull supplier and starts the polling task.
    pub fn connect_pull_supplier(
        self: &Arc<Self>,
        supplier: Arc<dyn PullSupplier>,
    ) -> ChannelResult<()> {
        let connection_id = self.link.lock().unwrap().connect(Some(supplier))?;
        if let Some(admin) = self.admin.upgrade() {
            admin.insert_pull_consumer(self.clone());
        }

        // Each connection gets its own cancellation channel; a stale task
        // from a previous connection keeps observing its own raised flag.
        let (cancel, cancel_rx) = watch::channel(false);
        *self.cancel.lock().unwrap() = Some(cancel);
        let proxy = self.clone();
        tokio::spawn(async move {
            proxy.poll_loop(cancel_rx).await;
        });

        debug!(proxy = %self.id, connection = %connection_id, "pull supplier connected");
        Ok(())
    }

    pub async fn disconnect_pull_consumer(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            let _ = cancel.send(true);
        }

        let peer = self.link.lock().unwrap().clear();
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_pull_consumer(self.id);
        }
        if let Some(supplier) = peer {
            supplier.disconnect_pull_supplier().await;
            debug!(proxy = %self.id, "pull consumer disconnected");
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
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            let _ = cancel.send(true);
        }
        if let Some(admin) = self.admin.upgrade() {
            admin.remove_pull_consumer(self.id);
        }
        if let Some(supplier) = peer {
            supplier.disconnect_pull_supplier().await;
        }
        debug!(proxy = %self.id, "pull consumer destroyed");
    }

    async fn poll_loop(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        trace!(proxy = %self.id, "polling task started");
        loop {
            if *cancel.borrow() {
                break;
            }

            let supplier = {
                let link = self.link.lock().unwrap();
                if link.is_connected() {
                    link.peer.clone()
                } else {
                    None
                }
            };
            let Some(supplier) = supplier else {
                if wait_or_cancelled(&mut cancel, self.config.idle_interval).await {
                    break;
                }
                continue;
            };

            match supplier.try_pull().await {
                Ok(Some(event)) => {
                    trace!(proxy = %self.id, event = %event.id(), "pulled event forwarded");
                    if let Err(e) = self.consumer_admin.publish(event) {
                        warn!(proxy = %self.id, error = %e, "forwarding stopped");
                        break;
                    }
                }
                Ok(None) => {
                    if wait_or_cancelled(&mut cancel, self.config.poll_interval).await {
                        break;
                    }
                }
                Err(ChannelError::Disconnected) => {
                    // A task whose connection was already torn down must
                    // not touch the connection that replaced it.
                    if !*cancel.borrow() {
                        debug!(proxy = %self.id, "supplier disconnected, stopping poll");
                        self.disconnect_pull_consumer().await;
                    }
                    break;
                }
                Err(e) => {
                    warn!(proxy = %self.id, error = %e, "pull failed, backing off");
                    if wait_or_cancelled(&mut cancel, self.config.idle_interval).await {
                        break;
                    }
                }
            }
        }
        trace!(proxy = %self.id, "polling task stopped");
    }
}

/// Sleeps for `duration` unless the cancellation signal fires first.
/// Returns true when the loop should stop.
async fn wait_or_cancelled(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
        _ = sleep(duration) => *cancel.borrow(),
    }
}

#[async_trait]
impl PullConsumer for ProxyPullConsumer {
    async fn disconnect_pull_consumer(&self) {
        ProxyPullConsumer::disconnect_pull_consumer(self).await;
    }
}
