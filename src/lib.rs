//! # Kairo: In-Process Event Channel
//!
//! Kairo is an event broker decoupling event suppliers from event consumers.
//! A channel relays every published event to every connected consumer without
//! either side knowing about the other.
//!
//! ## Architecture
//!
//! The channel follows a symmetric proxy model:
//! - A channel ([`channel`]) owns two admin objects
//! - The consumer admin ([`admin`]) mints consumer-facing proxies; the
//!   supplier admin mints supplier-facing ones ([`proxy`])
//! - Applications implement the communication traits ([`comm`]) and connect
//!   their endpoints to proxies
//!
//! ## Delivery Disciplines
//!
//! Both sides independently choose push or pull:
//! - Push suppliers call `push` on a [`proxy::ProxyPushConsumer`]; the
//!   channel fans the event out
//! - Push consumers receive `push` callbacks from a
//!   [`proxy::ProxyPushSupplier`] over a worker pool ([`dispatch`])
//! - Pull consumers draw buffered events from a
//!   [`proxy::ProxyPullSupplier`]
//! - Pull suppliers are polled by a [`proxy::ProxyPullConsumer`] background
//!   task
//!
//! ## Discovery
//!
//! The factory ([`factory`]) creates channels and publishes them in a
//! hierarchical naming service ([`naming`]) so unrelated parties can find
//! the same channel by name.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kairo::channel::EventChannel;
//! use kairo::comm::PushConsumer;
//! use kairo::event::Event;
//! use kairo::error::ChannelResult;
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl PushConsumer for Printer {
//!     async fn push(&self, event: Event) -> ChannelResult<()> {
//!         println!("got {}", event.id());
//!         Ok(())
//!     }
//!     async fn disconnect_push_consumer(&self) {}
//! }
//!
//! # fn run() -> Result<(), kairo::error::Error> {
//! let channel = EventChannel::with_defaults();
//! let proxy = channel.for_consumers()?.obtain_push_supplier();
//! proxy.connect_push_consumer(Arc::new(Printer))?;
//!
//! let publisher = channel.for_suppliers()?.obtain_push_consumer();
//! publisher.connect_push_supplier(None)?;
//! publisher.push(Event::new("hello"))?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod channel;
pub mod comm;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod factory;
pub mod naming;
pub mod proxy;

pub use channel::EventChannel;
pub use error::{ChannelError, ChannelResult, Error};
pub use event::Event;
pub use factory::EventChannelFactory;

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        // テストの前に一度だけ実行したい処理
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
