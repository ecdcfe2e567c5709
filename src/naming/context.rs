//! Naming context implementation backed by a concurrent binding table.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::{
    Binding, BindingType, Name, NameComponent, NamingError, NamingResult, NotFoundReason,
};

/// The value a name resolved to.
#[derive(Clone)]
pub enum Resolved {
    Object(Arc<dyn Any + Send + Sync>),
    Context(Arc<NamingContext>),
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Object(_) => f.write_str("Resolved::Object(..)"),
            Resolved::Context(_) => f.write_str("Resolved::Context(..)"),
        }
    }
}

enum BoundEntry {
    Object(Arc<dyn Any + Send + Sync>),
    Context(Arc<NamingContext>),
}

impl BoundEntry {
    fn binding_type(&self) -> BindingType {
        match self {
            BoundEntry::Object(_) => BindingType::Object,
            BoundEntry::Context(_) => BindingType::Context,
        }
    }
}

/// One node of the naming hierarchy.
///
/// Bindings on a single context are keyed by the `id`/`kind` pair of the
/// last name component; intermediate components must resolve to nested
/// contexts. All operations are safe to call concurrently.
pub struct NamingContext {
    bindings: DashMap<String, BoundEntry>,
    destroyed: AtomicBool,
}

fn binding_key(component: &NameComponent) -> String {
    format!("{}|{}", component.id, component.kind)
}

impl NamingContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            bindings: DashMap::new(),
            destroyed: AtomicBool::new(false),
        })
    }

    fn check_alive(&self, name: &Name) -> NamingResult<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(NamingError::CannotProceed { rest: name.clone() });
        }
        Ok(())
    }

    /// Splits a name into its first component and the remainder, or fails
    /// `InvalidName` on an empty name.
    fn split(name: &Name) -> NamingResult<(&NameComponent, Name)> {
        let first = name.components().first().ok_or(NamingError::InvalidName)?;
        Ok((first, name.suffix(1)))
    }

    /// Resolves the first component to a nested context, for descending on
    /// multi-component operations.
    fn descend(&self, first: &NameComponent, rest: &Name) -> NamingResult<Arc<NamingContext>> {
        match self.bindings.get(&binding_key(first)) {
            Some(entry) => match entry.value() {
                BoundEntry::Context(context) => Ok(context.clone()),
                BoundEntry::Object(_) => Err(NamingError::NotFound {
                    reason: NotFoundReason::NotContext,
                    rest: Name::rejoin(first, rest),
                }),
            },
            None => Err(NamingError::NotFound {
                reason: NotFoundReason::MissingNode,
                rest: Name::rejoin(first, rest),
            }),
        }
    }

    /// Maps an error from a nested operation back into this context's
    /// coordinate space by prepending the component we descended through.
    fn reframe(first: &NameComponent, err: NamingError) -> NamingError {
        match err {
            NamingError::NotFound { reason, rest } => NamingError::NotFound {
                reason,
                rest: Name::rejoin(first, &rest),
            },
            NamingError::CannotProceed { rest } => NamingError::CannotProceed {
                rest: Name::rejoin(first, &rest),
            },
            other => other,
        }
    }

    fn bind_entry(&self, name: &Name, entry: BoundEntry, rebind: bool) -> NamingResult<()> {
        self.check_alive(name)?;
        let (first, rest) = Self::split(name)?;
        if !rest.is_empty() {
            let next = self.descend(first, &rest)?;
            return next
                .bind_entry(&rest, entry, rebind)
                .map_err(|e| Self::reframe(first, e));
        }
        // 末端: このコンテキスト上のバインド
        if rebind {
            self.bindings.insert(binding_key(first), entry);
            return Ok(());
        }
        match self.bindings.entry(binding_key(first)) {
            Entry::Occupied(_) => Err(NamingError::AlreadyBound),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Binds an object under `name`. Fails `AlreadyBound` if the final
    /// component is taken.
    pub fn bind(&self, name: &Name, object: Arc<dyn Any + Send + Sync>) -> NamingResult<()> {
        debug!(name = %name, "Binding object");
        self.bind_entry(name, BoundEntry::Object(object), false)
    }

    /// Binds a nested context under `name`.
    pub fn bind_context(&self, name: &Name, context: Arc<NamingContext>) -> NamingResult<()> {
        debug!(name = %name, "Binding context");
        self.bind_entry(name, BoundEntry::Context(context), false)
    }

    /// Binds an object under `name`, replacing any existing binding.
    pub fn rebind(&self, name: &Name, object: Arc<dyn Any + Send + Sync>) -> NamingResult<()> {
        debug!(name = %name, "Rebinding object");
        self.bind_entry(name, BoundEntry::Object(object), true)
    }

    /// Binds a nested context under `name`, replacing any existing binding.
    pub fn rebind_context(&self, name: &Name, context: Arc<NamingContext>) -> NamingResult<()> {
        debug!(name = %name, "Rebinding context");
        self.bind_entry(name, BoundEntry::Context(context), true)
    }

    /// Creates a fresh empty context and binds it under `name`.
    pub fn bind_new_context(&self, name: &Name) -> NamingResult<Arc<NamingContext>> {
        let context = NamingContext::new();
        self.bind_context(name, context.clone())?;
        Ok(context)
    }

    /// Resolves `name` to whatever it is bound to.
    pub fn resolve(&self, name: &Name) -> NamingResult<Resolved> {
        self.check_alive(name)?;
        let (first, rest) = Self::split(name)?;
        if !rest.is_empty() {
            let next = self.descend(first, &rest)?;
            return next.resolve(&rest).map_err(|e| Self::reframe(first, e));
        }
        match self.bindings.get(&binding_key(first)) {
            Some(entry) => match entry.value() {
                BoundEntry::Object(object) => Ok(Resolved::Object(object.clone())),
                BoundEntry::Context(context) => Ok(Resolved::Context(context.clone())),
            },
            None => Err(NamingError::NotFound {
                reason: NotFoundReason::MissingNode,
                rest: name.clone(),
            }),
        }
    }

    /// Removes the binding under `name`. The bound value itself is not
    /// destroyed.
    pub fn unbind(&self, name: &Name) -> NamingResult<()> {
        self.check_alive(name)?;
        let (first, rest) = Self::split(name)?;
        if !rest.is_empty() {
            let next = self.descend(first, &rest)?;
            return next.unbind(&rest).map_err(|e| Self::reframe(first, e));
        }
        match self.bindings.remove(&binding_key(first)) {
            Some(_) => {
                debug!(name = %name, "Unbound");
                Ok(())
            }
            None => Err(NamingError::NotFound {
                reason: NotFoundReason::MissingNode,
                rest: name.clone(),
            }),
        }
    }

    /// Destroys this context. Fails `NotEmpty` while bindings remain;
    /// idempotent once empty.
    pub fn destroy(&self) -> NamingResult<()> {
        if !self.bindings.is_empty() {
            return Err(NamingError::NotEmpty);
        }
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Lists up to `how_many` bindings directly under this context. The
    /// remainder, if any, is returned through a [`BindingIterator`].
    pub fn list(&self, how_many: usize) -> (Vec<Binding>, Option<BindingIterator>) {
        let mut all: VecDeque<Binding> = self
            .bindings
            .iter()
            .map(|entry| {
                let (id, kind) = entry
                    .key()
                    .split_once('|')
                    .unwrap_or((entry.key().as_str(), ""));
                Binding {
                    name: Name::single(id, kind),
                    binding_type: entry.value().binding_type(),
                }
            })
            .collect();
        let head: Vec<Binding> = all.drain(..how_many.min(all.len())).collect();
        let iterator = if all.is_empty() {
            None
        } else {
            Some(BindingIterator {
                remaining: Mutex::new(all),
            })
        };
        (head, iterator)
    }
}

/// Hands out the bindings [`NamingContext::list`] did not return inline.
pub struct BindingIterator {
    remaining: Mutex<VecDeque<Binding>>,
}

impl BindingIterator {
    pub fn next_one(&self) -> Option<Binding> {
        self.remaining.lock().unwrap().pop_front()
    }

    pub fn next_n(&self, how_many: usize) -> Vec<Binding> {
        let mut remaining = self.remaining.lock().unwrap();
        let take = how_many.min(remaining.len());
        remaining.drain(..take).collect()
    }

    /// Discards the undelivered remainder.
    pub fn destroy(&self) {
        self.remaining.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bind_and_resolve() {
        let root = NamingContext::new();
        let name = Name::single("alpha", "EventChannel");
        root.bind(&name, Arc::new(42u32)).unwrap();

        match root.resolve(&name).unwrap() {
            Resolved::Object(object) => {
                assert_eq!(*object.downcast::<u32>().unwrap(), 42);
            }
            Resolved::Context(_) => panic!("expected object"),
        }
    }

    #[test]
    fn test_bind_rejects_duplicate() {
        let root = NamingContext::new();
        let name = Name::single("alpha", "");
        root.bind(&name, Arc::new(1u32)).unwrap();
        assert!(matches!(
            root.bind(&name, Arc::new(2u32)),
            Err(NamingError::AlreadyBound)
        ));
    }

    #[test]
    fn test_rebind_replaces() {
        let root = NamingContext::new();
        let name = Name::single("alpha", "");
        root.bind(&name, Arc::new(1u32)).unwrap();
        root.rebind(&name, Arc::new(2u32)).unwrap();
        match root.resolve(&name).unwrap() {
            Resolved::Object(object) => assert_eq!(*object.downcast::<u32>().unwrap(), 2),
            Resolved::Context(_) => panic!("expected object"),
        }
    }

    #[test]
    fn test_nested_resolution() {
        let root = NamingContext::new();
        let services = root
            .bind_new_context(&Name::single("services", "ctx"))
            .unwrap();
        services
            .bind(&Name::single("alpha", "EventChannel"), Arc::new(7u32))
            .unwrap();

        let full = Name::from_string("services.ctx/alpha.EventChannel");
        match root.resolve(&full).unwrap() {
            Resolved::Object(object) => assert_eq!(*object.downcast::<u32>().unwrap(), 7),
            Resolved::Context(_) => panic!("expected object"),
        }
    }

    #[test]
    fn test_missing_node_reports_rest_of_name() {
        let root = NamingContext::new();
        root.bind_new_context(&Name::single("a", "")).unwrap();
        let err = root.resolve(&Name::from_string("a/b/c")).unwrap_err();
        match err {
            NamingError::NotFound { reason, rest } => {
                assert_eq!(reason, NotFoundReason::MissingNode);
                assert_eq!(rest.to_string(), "b/c");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_descend_through_object_fails() {
        let root = NamingContext::new();
        root.bind(&Name::single("leaf", ""), Arc::new(0u32)).unwrap();
        let err = root.resolve(&Name::from_string("leaf/x")).unwrap_err();
        assert!(matches!(
            err,
            NamingError::NotFound {
                reason: NotFoundReason::NotContext,
                ..
            }
        ));
    }

    #[test]
    fn test_unbind() {
        let root = NamingContext::new();
        let name = Name::single("alpha", "");
        root.bind(&name, Arc::new(1u32)).unwrap();
        root.unbind(&name).unwrap();
        assert!(matches!(
            root.resolve(&name),
            Err(NamingError::NotFound { .. })
        ));
        assert!(matches!(
            root.unbind(&name),
            Err(NamingError::NotFound { .. })
        ));
    }

    #[test]
    fn test_destroy_requires_empty() {
        let root = NamingContext::new();
        let name = Name::single("alpha", "");
        root.bind(&name, Arc::new(1u32)).unwrap();
        assert!(matches!(root.destroy(), Err(NamingError::NotEmpty)));
        root.unbind(&name).unwrap();
        root.destroy().unwrap();
        // 破棄後の操作は CannotProceed
        assert!(matches!(
            root.resolve(&name),
            Err(NamingError::CannotProceed { .. })
        ));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let root = NamingContext::new();
        assert!(matches!(
            root.resolve(&Name::default()),
            Err(NamingError::InvalidName)
        ));
    }

    #[test]
    fn test_list_with_iterator() {
        let root = NamingContext::new();
        for i in 0..5 {
            root.bind(&Name::single(&format!("n{i}"), ""), Arc::new(i))
                .unwrap();
        }
        let (head, iterator) = root.list(3);
        assert_eq!(head.len(), 3);
        let iterator = iterator.unwrap();
        let mut tail = iterator.next_n(10);
        assert_eq!(tail.len(), 2);
        assert!(iterator.next_one().is_none());
        tail.extend(head);
        assert_eq!(tail.len(), 5);
    }

    #[test]
    fn test_list_exact_fit_has_no_iterator() {
        let root = NamingContext::new();
        root.bind(&Name::single("only", ""), Arc::new(0u32)).unwrap();
        let (head, iterator) = root.list(1);
        assert_eq!(head.len(), 1);
        assert!(iterator.is_none());
    }
}
