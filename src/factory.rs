//! # EventChannelFactory
//!
//! Creates channels and publishes them in the naming service so unrelated
//! parties can discover the same channel by name. The factory keeps its own
//! registry of the channels it created; `lookup` falls back to the naming
//! service for channels registered by other factories.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::channel::EventChannel;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, Error};
use crate::naming::{Name, NamingContext, NamingError, Resolved};

const CHANNEL_KIND: &str = "EventChannel";

pub struct EventChannelFactory {
    channels: DashMap<String, Arc<EventChannel>>,
    naming: Arc<NamingContext>,
    config: ChannelConfig,
}

impl EventChannelFactory {
    pub fn new(naming: Arc<NamingContext>, config: ChannelConfig) -> Self {
        Self {
            channels: DashMap::new(),
            naming,
            config,
        }
    }

    fn channel_name(name: &str) -> Name {
        Name::single(name, CHANNEL_KIND)
    }

    /// Creates an anonymous channel. It is not registered anywhere; the
    /// caller owns distribution of the handle.
    pub fn create_channel(&self) -> Arc<EventChannel> {
        EventChannel::new(self.config.clone())
    }

    /// Creates a channel and registers it under `name`.
    pub fn create_named_channel(&self, name: &str) -> Result<Arc<EventChannel>, Error> {
        let channel = self.create_channel();
        self.register(name, channel.clone())?;
        Ok(channel)
    }

    /// Registers `channel` under `name`, replacing any previous
    /// registration for that name.
    pub fn register(&self, name: &str, channel: Arc<EventChannel>) -> Result<(), Error> {
        self.naming
            .rebind(&Self::channel_name(name), channel.clone())?;
        self.channels.insert(name.to_string(), channel);
        debug!(name, "channel registered");
        Ok(())
    }

    /// Finds the channel registered under `name`, consulting the local
    /// registry first and the naming service second. A name bound to
    /// something other than a channel fails with a type error.
    pub fn lookup(&self, name: &str) -> Result<Arc<EventChannel>, Error> {
        if let Some(channel) = self.channels.get(name) {
            return Ok(channel.clone());
        }
        match self.naming.resolve(&Self::channel_name(name))? {
            Resolved::Object(object) => object
                .downcast::<EventChannel>()
                .map_err(|_| {
                    ChannelError::TypeError {
                        expected: CHANNEL_KIND.to_string(),
                    }
                    .into()
                }),
            Resolved::Context(_) => Err(ChannelError::TypeError {
                expected: CHANNEL_KIND.to_string(),
            }
            .into()),
        }
    }

    /// Drops the registration for `name`. The channel itself keeps running
    /// until destroyed.
    pub fn unregister(&self, name: &str) -> Result<(), Error> {
        self.channels.remove(name);
        match self.naming.unbind(&Self::channel_name(name)) {
            Ok(()) | Err(NamingError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
