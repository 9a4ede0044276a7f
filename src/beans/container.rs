//! The built-in registration-based bean container.

use super::{Bean, BeanContainer, Lifetime};
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::sync::{Arc, LazyLock, OnceLock};

type BeanFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

struct Registration {
    name: Option<String>,
    lifetime: Lifetime,
    type_id: TypeId,
    type_name: &'static str,
    factory: BeanFactory,
    /// Lazily created instance for singleton registrations.
    singleton: OnceLock<Arc<dyn Any + Send + Sync>>,
}

impl Registration {
    fn resolve(&self) -> Arc<dyn Any + Send + Sync> {
        match self.lifetime {
            Lifetime::Singleton => self.singleton.get_or_init(|| (self.factory)()).clone(),
            Lifetime::Prototype => (self.factory)(),
        }
    }

    fn as_bean(&self) -> Bean {
        Bean {
            value: self.resolve(),
            name: self.name.clone(),
            lifetime: self.lifetime,
            type_name: self.type_name,
        }
    }
}

/// A [`BeanContainer`] backed by explicit registrations.
///
/// This is the container used when no external DI framework installs one:
/// applications register their beans during startup, the provider resolves
/// them afterwards. Registering a named bean under an existing name
/// replaces the previous registration (and logs a warning, since that is
/// usually a wiring mistake).
pub struct StaticBeanContainer {
    registrations: RwLock<Vec<Arc<Registration>>>,
}

static GLOBAL: LazyLock<Arc<StaticBeanContainer>> =
    LazyLock::new(|| Arc::new(StaticBeanContainer::new()));

impl StaticBeanContainer {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide instance, the one registered with [`crate::spi`].
    pub fn global() -> Arc<StaticBeanContainer> {
        GLOBAL.clone()
    }

    /// Registers an already constructed singleton.
    pub fn register_instance<T: Send + Sync + 'static>(&self, value: T) {
        self.register_with(None, Lifetime::Singleton, prefilled(value));
    }

    /// Registers an already constructed singleton under a name.
    pub fn register_named_instance<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        self.register_with(Some(name), Lifetime::Singleton, prefilled(value));
    }

    /// Registers a singleton constructed on first lookup.
    pub fn register_singleton<T, F>(&self, name: Option<&str>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_with(
            name,
            Lifetime::Singleton,
            Registration {
                name: None,
                lifetime: Lifetime::Singleton,
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                factory: Arc::new(move || Arc::new(factory())),
                singleton: OnceLock::new(),
            },
        );
    }

    /// Registers a prototype: every lookup constructs a fresh instance.
    pub fn register_prototype<T, F>(&self, name: Option<&str>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_with(
            name,
            Lifetime::Prototype,
            Registration {
                name: None,
                lifetime: Lifetime::Prototype,
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                factory: Arc::new(move || Arc::new(factory())),
                singleton: OnceLock::new(),
            },
        );
    }

    fn register_with(&self, name: Option<&str>, lifetime: Lifetime, template: Registration) {
        let registration = Arc::new(Registration {
            name: name.map(str::to_owned),
            lifetime,
            ..template
        });

        let mut registrations = self.registrations.write();
        if let Some(name) = name {
            if let Some(existing) = registrations
                .iter_mut()
                .find(|existing| existing.name.as_deref() == Some(name))
            {
                tracing::warn!(
                    "Replacing bean '{}' ({}) with a new registration ({})",
                    name,
                    existing.type_name,
                    registration.type_name
                );
                *existing = registration;
                return;
            }
        }

        registrations.push(registration);
    }
}

fn prefilled<T: Send + Sync + 'static>(value: T) -> Registration {
    let singleton = OnceLock::new();
    let _ = singleton.set(Arc::new(value) as Arc<dyn Any + Send + Sync>);

    Registration {
        name: None,
        lifetime: Lifetime::Singleton,
        type_id: TypeId::of::<T>(),
        type_name: type_name::<T>(),
        // Never called: the singleton cell is already filled.
        factory: Arc::new(|| unreachable!("prefilled singleton")),
        singleton,
    }
}

impl Default for StaticBeanContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanContainer for StaticBeanContainer {
    fn lookup_by_name(&self, name: &str) -> Option<Bean> {
        self.registrations
            .read()
            .iter()
            .find(|registration| registration.name.as_deref() == Some(name))
            .map(|registration| registration.as_bean())
    }

    fn lookup_by_type(&self, type_id: TypeId) -> Vec<Bean> {
        self.registrations
            .read()
            .iter()
            .filter(|registration| registration.type_id == type_id)
            .map(|registration| registration.as_bean())
            .collect()
    }
}
