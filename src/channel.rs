//! # EventChannel
//!
//! The broker decoupling suppliers from consumers. A channel owns one
//! dispatch engine and, lazily, one [`ConsumerAdmin`] and one
//! [`SupplierAdmin`]; destroying the channel cascades through both admins
//! and every proxy they minted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;
use uuid::Uuid;

use crate::admin::{ConsumerAdmin, SupplierAdmin};
use crate::config::ChannelConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ChannelError, ChannelResult};

pub struct EventChannel {
    id: Uuid,
    config: ChannelConfig,
    dispatcher: Arc<Dispatcher>,
    consumer_admin: OnceLock<Arc<ConsumerAdmin>>,
    supplier_admin: OnceLock<Arc<SupplierAdmin>>,
    destroyed: AtomicBool,
}

impl EventChannel {
    pub fn new(config: ChannelConfig) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch.clone()));
        let channel = Arc::new(Self {
            id: Uuid::new_v4(),
            config,
            dispatcher,
            consumer_admin: OnceLock::new(),
            supplier_admin: OnceLock::new(),
            destroyed: AtomicBool::new(false),
        });
        debug!(channel = %channel.id, "event channel created");
        channel
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(ChannelConfig::default())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Returns the consumer admin, creating it on first access.
    pub fn for_consumers(&self) -> ChannelResult<Arc<ConsumerAdmin>> {
        if self.is_destroyed() {
            return Err(ChannelError::ChannelDestroyed);
        }
        Ok(self
            .consumer_admin
            .get_or_init(|| {
                ConsumerAdmin::new(
                    self.dispatcher.clone(),
                    self.config.dispatch.estimated_consumers,
                )
            })
            .clone())
    }

    /// Returns the supplier admin, creating it on first access.
    ///
    /// Supplier-side proxies publish into the consumer admin's fan-out, so
    /// this also materializes the consumer admin; `for_consumers` returns
    /// that same instance.
    pub fn for_suppliers(&self) -> ChannelResult<Arc<SupplierAdmin>> {
        if self.is_destroyed() {
            return Err(ChannelError::ChannelDestroyed);
        }
        let consumer_admin = self.for_consumers()?;
        Ok(self
            .supplier_admin
            .get_or_init(|| {
                SupplierAdmin::new(
                    consumer_admin,
                    self.config.pull.clone(),
                    self.config.dispatch.estimated_consumers,
                )
            })
            .clone())
    }

    /// Idempotent teardown: stops the dispatch engine, then destroys every
    /// proxy through the admins. Supplier side first so no new events enter
    /// the channel while consumers are being torn down.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(channel = %self.id, "destroying event channel");
        self.dispatcher.shutdown();

        if let Some(admin) = self.supplier_admin.get() {
            admin.destroy().await;
        }
        if let Some(admin) = self.consumer_admin.get() {
            admin.destroy().await;
        }
    }
}
