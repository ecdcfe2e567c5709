//! # Naming service
//!
//! A hierarchical directory used to publish and discover channel instances
//! by path. Names are sequences of `id.kind` components; contexts nest to
//! form the hierarchy. The channel core only consumes the
//! register/lookup/unregister surface (see [`crate::factory`]); the full
//! contract is provided for external collaborators.

mod context;

pub use context::{BindingIterator, NamingContext, Resolved};

use std::fmt;

use thiserror::Error;

/// One component of a hierarchical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameComponent {
    pub id: String,
    pub kind: String,
}

impl NameComponent {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}.{}", self.id, self.kind)
        }
    }
}

/// A hierarchical name: a sequence of components, outermost first.
///
/// String form is `id1.kind1/id2.kind2/...`; a component without a dot has
/// an empty kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new(components: Vec<NameComponent>) -> Self {
        Self { components }
    }

    pub fn single(id: &str, kind: &str) -> Self {
        Self {
            components: vec![NameComponent::new(id, kind)],
        }
    }

    pub fn from_string(value: &str) -> Self {
        if value.is_empty() {
            return Self::default();
        }
        let components = value
            .split('/')
            .map(|component| match component.split_once('.') {
                Some((id, kind)) => NameComponent::new(id, kind),
                None => NameComponent::new(component, ""),
            })
            .collect();
        Self { components }
    }

    pub fn push(mut self, component: NameComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All but the first component.
    pub fn suffix(&self, start: usize) -> Name {
        Name {
            components: self.components[start.min(self.components.len())..].to_vec(),
        }
    }

    /// Rebuilds the full rest-of-name when a nested operation failed:
    /// the component we descended through plus the nested rest.
    fn rejoin(first: &NameComponent, rest: &Name) -> Name {
        let mut components = Vec::with_capacity(rest.len() + 1);
        components.push(first.clone());
        components.extend(rest.components.iter().cloned());
        Name { components }
    }
}

impl std::str::FromStr for Name {
    type Err = NamingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(NamingError::InvalidName);
        }
        Ok(Self::from_string(value))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}", component)?;
            first = false;
        }
        Ok(())
    }
}

/// Why a resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    MissingNode,
    NotContext,
    NotObject,
}

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    Object,
    Context,
}

/// One entry reported by [`NamingContext::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: Name,
    pub binding_type: BindingType,
}

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("name not found ({reason:?}) at: {rest}")]
    NotFound { reason: NotFoundReason, rest: Name },

    #[error("cannot proceed at: {rest}")]
    CannotProceed { rest: Name },

    #[error("invalid (empty) name")]
    InvalidName,

    #[error("name already bound")]
    AlreadyBound,

    #[error("context not empty")]
    NotEmpty,
}

pub type NamingResult<T> = Result<T, NamingError>;
