//! Bean container abstraction and the managed bean provider.
//!
//! A *bean* is an object whose construction and wiring is delegated to a
//! container. The [`BeanContainer`] trait is the capability interface a
//! DI framework implements; [`BeanProvider`] is the facade applications
//! use, adding a per-thread cache for singleton beans and turning the
//! container's raw candidate lists into typed results with distinct
//! failure kinds.
//!
//! The active container is discovered through [`crate::spi`] on first use.
//! [`StaticBeanContainer`] is the built-in implementation, registered at
//! low priority so that an external container wins when one is present.

use std::any::{Any, TypeId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod container;
mod provider;

pub use container::StaticBeanContainer;
pub use provider::{BeanProvider, install, provider};

/// How long a resolved bean lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One instance for the whole process. Eligible for provider caching.
    Singleton,
    /// A fresh instance per lookup. Never cached.
    Prototype,
}

/// A resolution candidate returned by a [`BeanContainer`].
#[derive(Clone)]
pub struct Bean {
    /// The type-erased instance.
    pub value: Arc<dyn Any + Send + Sync>,
    /// The bean name, if the registration carries one.
    pub name: Option<String>,
    pub lifetime: Lifetime,
    /// Human-readable type name for diagnostics.
    pub type_name: &'static str,
}

impl Bean {
    /// Describes the candidate for error messages: `name (type)` or just
    /// the type when unnamed.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.type_name),
            None => self.type_name.to_string(),
        }
    }
}

/// The capability interface implemented by a DI container.
///
/// Implementations are expected to be cheap to query: the provider may
/// call into the container on every lookup of a prototype bean.
pub trait BeanContainer: Send + Sync {
    /// Resolves the bean registered under `name`, if any.
    fn lookup_by_name(&self, name: &str) -> Option<Bean>;

    /// Resolves all candidates whose instance type is `type_id`.
    fn lookup_by_type(&self, type_id: TypeId) -> Vec<Bean>;
}

/// Failure kinds surfaced by the [`BeanProvider`].
#[derive(Debug)]
pub enum BeanError {
    /// No candidate matched the requested type or name.
    NotFound {
        type_name: &'static str,
        name: Option<String>,
    },
    /// More than one candidate matched a by-type lookup.
    Ambiguous {
        type_name: &'static str,
        candidates: Vec<String>,
    },
    /// A named bean exists but is not of the requested type.
    TypeMismatch {
        expected: &'static str,
        name: Option<String>,
    },
    /// No bean container is installed or discoverable.
    NoContainer(String),
}

impl Display for BeanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BeanError::NotFound { type_name, name } => match name {
                Some(name) => write!(f, "No bean named '{}' of type {}", name, type_name),
                None => write!(f, "No bean of type {}", type_name),
            },
            BeanError::Ambiguous {
                type_name,
                candidates,
            } => write!(
                f,
                "Multiple beans of type {}: {}",
                type_name,
                candidates.join(", ")
            ),
            BeanError::TypeMismatch { expected, name } => match name {
                Some(name) => write!(f, "Bean '{}' is not of the expected type {}", name, expected),
                None => write!(f, "Bean is not of the expected type {}", expected),
            },
            BeanError::NoContainer(message) => {
                write!(f, "No bean container available: {}", message)
            }
        }
    }
}

impl Error for BeanError {}

pub type BeanResult<T> = Result<T, BeanError>;
