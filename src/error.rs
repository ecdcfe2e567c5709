use thiserror::Error;

use crate::naming::NamingError;

/// Errors raised by proxies, admins and the channel itself.
///
/// Connection-lifecycle failures (`AlreadyConnected`, `Disconnected`,
/// `TypeError`) are returned synchronously to the caller of the failing
/// operation. `Unreachable` and `Transient` are the tagged outcomes of an
/// asynchronous delivery attempt; they are never surfaced to the publisher
/// and only drive the channel's self-healing membership (see
/// [`crate::proxy::ProxyPushSupplier`]).
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("peer is already connected")]
    AlreadyConnected,

    #[error("component has been disconnected")]
    Disconnected,

    #[error("peer does not satisfy the {expected} role")]
    TypeError { expected: String },

    /// The peer is confirmed gone (endpoint no longer exists).
    #[error("peer is unreachable: {0}")]
    Unreachable(String),

    /// The peer is temporarily unavailable but not confirmed gone.
    #[error("peer is temporarily unavailable: {0}")]
    Transient(String),

    /// A bounded dispatch backlog rejected the job.
    #[error("dispatch backlog is full")]
    Congested,

    #[error("event channel has been destroyed")]
    ChannelDestroyed,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }
}
