//! # Event
//!
//! The opaque unit of traffic flowing through a channel. The channel never
//! inspects or transforms the payload; it only moves it from suppliers to
//! consumers. Payloads are type-erased behind `Arc<dyn Any>` so that one
//! published event can be fanned out to any number of consumers without
//! copying, and consumers recover the concrete type with
//! [`Event::downcast_ref`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// An opaque event payload with a stable identity.
///
/// Cloning is cheap (the payload is shared); the id survives cloning so a
/// single published event is traceable across all its delivery subtasks.
#[derive(Clone)]
pub struct Event {
    id: Uuid,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Event {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Arc::new(payload),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Recovers the concrete payload type, if it matches.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("id", &self.id).finish()
    }
}
