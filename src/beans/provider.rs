//! The managed bean provider: typed lookups plus per-thread singleton caching.

use super::{Bean, BeanContainer, BeanError, BeanResult, Lifetime, StaticBeanContainer};
use crate::cache::ThreadCache;
use arc_swap::ArcSwapOption;
use std::any::{Any, TypeId, type_name};
use std::sync::{Arc, LazyLock, Once};

/// Cache key: the requested type combined with the optional bean name.
///
/// A named and an unnamed lookup of the same type are distinct entries.
#[derive(Clone, PartialEq, Eq, Hash)]
struct BeanKey {
    type_id: TypeId,
    name: Option<String>,
}

/// The facade unifying by-type and by-name lookups against a container.
///
/// Singleton beans are cached per thread so that repeated lookups on a
/// request thread skip the container entirely. Prototype beans always go
/// to the container. Use [`clear_thread_cache`](Self::clear_thread_cache)
/// at request boundaries to release the calling thread's entries.
pub struct BeanProvider {
    container: Arc<dyn BeanContainer>,
    singletons: ThreadCache<BeanKey, Arc<dyn Any + Send + Sync>>,
}

impl BeanProvider {
    pub fn new(container: Arc<dyn BeanContainer>) -> Self {
        Self {
            container,
            singletons: ThreadCache::new(),
        }
    }

    /// Resolves the single bean of type `T`.
    ///
    /// Fails with [`BeanError::NotFound`] when no candidate exists and
    /// with [`BeanError::Ambiguous`] when more than one does.
    pub fn get<T: Send + Sync + 'static>(&self) -> BeanResult<Arc<T>> {
        self.find()?.ok_or_else(|| BeanError::NotFound {
            type_name: type_name::<T>(),
            name: None,
        })
    }

    /// Like [`get`](Self::get), but absence is `Ok(None)` instead of an
    /// error. Ambiguity is still an error.
    pub fn find<T: Send + Sync + 'static>(&self) -> BeanResult<Option<Arc<T>>> {
        let key = BeanKey {
            type_id: TypeId::of::<T>(),
            name: None,
        };

        if let Some(cached) = self.cached::<T>(&key) {
            return Ok(Some(cached));
        }

        let mut candidates = self.container.lookup_by_type(key.type_id);
        match candidates.len() {
            0 => Ok(None),
            1 => {
                let bean = candidates.remove(0);
                self.unwrap_candidate(bean, key).map(Some)
            }
            _ => Err(BeanError::Ambiguous {
                type_name: type_name::<T>(),
                candidates: candidates.iter().map(Bean::describe).collect(),
            }),
        }
    }

    /// Resolves the bean registered under `name` as a `T`.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> BeanResult<Arc<T>> {
        self.find_named(name)?.ok_or_else(|| BeanError::NotFound {
            type_name: type_name::<T>(),
            name: Some(name.to_owned()),
        })
    }

    /// Like [`get_named`](Self::get_named), but absence is `Ok(None)`.
    ///
    /// A bean that exists under the name but has another type is still a
    /// [`BeanError::TypeMismatch`]: that is a wiring mistake, not absence.
    pub fn find_named<T: Send + Sync + 'static>(&self, name: &str) -> BeanResult<Option<Arc<T>>> {
        let key = BeanKey {
            type_id: TypeId::of::<T>(),
            name: Some(name.to_owned()),
        };

        if let Some(cached) = self.cached::<T>(&key) {
            return Ok(Some(cached));
        }

        match self.container.lookup_by_name(name) {
            Some(bean) => self.unwrap_candidate(bean, key).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves all candidates of type `T`, never an ambiguity error.
    ///
    /// Candidates the container mislabeled (their value does not downcast
    /// to `T`) are logged and skipped.
    pub fn get_all<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.container
            .lookup_by_type(TypeId::of::<T>())
            .into_iter()
            .filter_map(|bean| match bean.value.clone().downcast::<T>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(
                        "Container returned {} for a lookup of {}",
                        bean.describe(),
                        type_name::<T>()
                    );
                    None
                }
            })
            .collect()
    }

    /// Drops the calling thread's cached singletons.
    ///
    /// Intended as a request-boundary hook; other threads keep their
    /// entries.
    pub fn clear_thread_cache(&self) {
        self.singletons.clear_current_thread();
    }

    fn cached<T: Send + Sync + 'static>(&self, key: &BeanKey) -> Option<Arc<T>> {
        // Only singleton values are ever stored, so the downcast holds
        // unless the container was swapped mid-flight; drop the entry then.
        match self.singletons.get(key)?.downcast::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.singletons.remove(key);
                None
            }
        }
    }

    fn unwrap_candidate<T: Send + Sync + 'static>(
        &self,
        bean: Bean,
        key: BeanKey,
    ) -> BeanResult<Arc<T>> {
        let value =
            bean.value
                .clone()
                .downcast::<T>()
                .map_err(|_| BeanError::TypeMismatch {
                    expected: type_name::<T>(),
                    name: key.name.clone(),
                })?;

        if bean.lifetime == Lifetime::Singleton {
            self.singletons.put(key, bean.value);
        }

        Ok(value)
    }
}

static ACTIVE: LazyLock<ArcSwapOption<BeanProvider>> = LazyLock::new(|| ArcSwapOption::new(None));

static DEFAULT_BINDINGS: Once = Once::new();

fn ensure_default_bindings() {
    DEFAULT_BINDINGS.call_once(|| {
        crate::spi::register::<Arc<dyn BeanContainer>, _>("static-bean-container", -100, || {
            let container: Arc<dyn BeanContainer> = StaticBeanContainer::global();
            Ok(container)
        });
    });
}

/// The process-wide provider over the active container.
///
/// On first use the container is discovered through [`crate::spi`]; the
/// built-in [`StaticBeanContainer`] is bound at priority -100, so any
/// binding a host registers wins. [`install`] bypasses discovery.
pub fn provider() -> BeanResult<Arc<BeanProvider>> {
    if let Some(active) = ACTIVE.load_full() {
        return Ok(active);
    }

    ensure_default_bindings();
    let container = crate::spi::load::<Arc<dyn BeanContainer>>()
        .map_err(|err| BeanError::NoContainer(format!("{:#}", err)))?;

    let fresh = Arc::new(BeanProvider::new(container));
    ACTIVE.store(Some(fresh.clone()));
    tracing::info!("Activated bean container");

    Ok(fresh)
}

/// Installs `container` as the active one, replacing any current provider.
///
/// Existing [`BeanProvider`] handles keep serving the old container.
pub fn install(container: Arc<dyn BeanContainer>) {
    ACTIVE.store(Some(Arc::new(BeanProvider::new(container))));
    tracing::info!("Installed bean container");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Wraps a [`StaticBeanContainer`] and counts lookups, so tests can
    /// observe whether the provider cache short-circuited the container.
    struct CountingContainer {
        inner: StaticBeanContainer,
        type_lookups: AtomicUsize,
        name_lookups: AtomicUsize,
    }

    impl CountingContainer {
        fn new(inner: StaticBeanContainer) -> Arc<Self> {
            Arc::new(Self {
                inner,
                type_lookups: AtomicUsize::new(0),
                name_lookups: AtomicUsize::new(0),
            })
        }
    }

    impl BeanContainer for CountingContainer {
        fn lookup_by_name(&self, name: &str) -> Option<Bean> {
            self.name_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup_by_name(name)
        }

        fn lookup_by_type(&self, type_id: TypeId) -> Vec<Bean> {
            self.type_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup_by_type(type_id)
        }
    }

    struct Repository {
        url: &'static str,
    }

    struct Mailer;

    #[test]
    fn singleton_lookup_is_served_from_the_thread_cache() {
        let registrations = StaticBeanContainer::new();
        registrations.register_instance(Repository { url: "db://primary" });
        let container = CountingContainer::new(registrations);
        let provider = BeanProvider::new(container.clone());

        let first = provider.get::<Repository>().unwrap();
        let second = provider.get::<Repository>().unwrap();

        assert_eq!(first.url, "db://primary");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prototype_lookup_always_hits_the_container() {
        let registrations = StaticBeanContainer::new();
        registrations.register_prototype(None, || Mailer);
        let container = CountingContainer::new(registrations);
        let provider = BeanProvider::new(container.clone());

        let first = provider.get::<Mailer>().unwrap();
        let second = provider.get::<Mailer>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn each_thread_populates_its_own_cache() {
        let registrations = StaticBeanContainer::new();
        registrations.register_instance(Repository { url: "db://shared" });
        let container = CountingContainer::new(registrations);
        let provider = Arc::new(BeanProvider::new(container.clone()));

        let here = provider.get::<Repository>().unwrap();
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 1);

        let provider_for_thread = provider.clone();
        let there = thread::spawn(move || {
            // Fresh thread, fresh cache: miss, then hit.
            let first = provider_for_thread.get::<Repository>().unwrap();
            let _second = provider_for_thread.get::<Repository>().unwrap();
            first
        })
        .join()
        .unwrap();

        // Exactly one extra container lookup for the other thread, and
        // both threads share the same underlying singleton instance.
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&here, &there));
    }

    #[test]
    fn clear_thread_cache_forces_a_container_lookup() {
        let registrations = StaticBeanContainer::new();
        registrations.register_instance(Repository { url: "db://primary" });
        let container = CountingContainer::new(registrations);
        let provider = BeanProvider::new(container.clone());

        provider.get::<Repository>().unwrap();
        provider.clear_thread_cache();
        provider.get::<Repository>().unwrap();

        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ambiguous_candidates_are_an_error_and_never_cached() {
        let registrations = StaticBeanContainer::new();
        registrations.register_named_instance("primary", Repository { url: "db://primary" });
        registrations.register_named_instance("replica", Repository { url: "db://replica" });
        let container = CountingContainer::new(registrations);
        let provider = BeanProvider::new(container.clone());

        for _ in 0..2 {
            match provider.get::<Repository>() {
                Err(BeanError::Ambiguous { candidates, .. }) => {
                    assert_eq!(candidates.len(), 2);
                }
                other => panic!("Expected Ambiguous, got {:?}", other.map(|_| ())),
            }
        }

        // Nothing was cached, so both attempts went to the container.
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn named_and_unnamed_lookups_use_distinct_cache_entries() {
        let registrations = StaticBeanContainer::new();
        registrations.register_named_instance("primary", Repository { url: "db://primary" });
        let container = CountingContainer::new(registrations);
        let provider = BeanProvider::new(container.clone());

        let by_name = provider.get_named::<Repository>("primary").unwrap();
        // Distinct key: the by-type lookup misses the cache once.
        let by_type = provider.get::<Repository>().unwrap();
        provider.get_named::<Repository>("primary").unwrap();
        provider.get::<Repository>().unwrap();

        assert!(Arc::ptr_eq(&by_name, &by_type));
        assert_eq!(container.name_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(container.type_lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_bean_of_another_type_is_a_type_mismatch() {
        let registrations = StaticBeanContainer::new();
        registrations.register_named_instance("mailer", Mailer);
        let provider = BeanProvider::new(CountingContainer::new(registrations));

        match provider.get_named::<Repository>("mailer") {
            Err(BeanError::TypeMismatch { name, .. }) => {
                assert_eq!(name.as_deref(), Some("mailer"));
            }
            other => panic!("Expected TypeMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn absence_is_an_error_for_get_but_not_for_find() {
        let provider = BeanProvider::new(CountingContainer::new(StaticBeanContainer::new()));

        assert!(matches!(
            provider.get::<Repository>(),
            Err(BeanError::NotFound { name: None, .. })
        ));
        assert!(provider.find::<Repository>().unwrap().is_none());
        assert!(provider.find_named::<Repository>("primary").unwrap().is_none());
    }

    #[test]
    fn get_all_returns_every_candidate() {
        let registrations = StaticBeanContainer::new();
        registrations.register_named_instance("primary", Repository { url: "db://primary" });
        registrations.register_named_instance("replica", Repository { url: "db://replica" });
        let provider = BeanProvider::new(CountingContainer::new(registrations));

        let mut urls: Vec<&str> = provider
            .get_all::<Repository>()
            .iter()
            .map(|repository| repository.url)
            .collect();
        urls.sort();
        assert_eq!(urls, vec!["db://primary", "db://replica"]);
    }

    #[test]
    fn installed_container_serves_the_global_provider() {
        struct GlobalProbe {
            marker: &'static str,
        }

        let registrations = StaticBeanContainer::new();
        registrations.register_instance(GlobalProbe { marker: "installed" });
        install(Arc::new(registrations));

        let probe = provider().unwrap().get::<GlobalProbe>().unwrap();
        assert_eq!(probe.marker, "installed");
    }
}
