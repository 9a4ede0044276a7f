//! Plugin discovery with priority-based selection.
//!
//! Abstractions in this crate (the bean container, resource locators) are
//! wired to their implementations through a process-global registry of
//! bindings. Hosts register their implementations at process start,
//! built-in defaults are registered by the crate itself at low priority.
//!
//! A binding is keyed by the service handle type `S`, which is normally a
//! shared pointer to a trait object such as `Arc<dyn BeanContainer>`.
//!
//! ```rust,ignore
//! spi::register::<Arc<dyn BeanContainer>>("cdi-bridge", 100, || {
//!     Ok(Arc::new(CdiBridgeContainer::connect()?))
//! });
//! ```

use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

type ErasedFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

struct Binding {
    name: &'static str,
    priority: i32,
    factory: ErasedFactory,
}

static BINDINGS: LazyLock<RwLock<HashMap<TypeId, Vec<Binding>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registers an implementation binding for the service handle type `S`.
///
/// `name` identifies the binding in logs. Among multiple bindings for the
/// same service, the highest `priority` wins; ties are resolved in favor
/// of the earliest registration.
pub fn register<S, F>(name: &'static str, priority: i32, factory: F)
where
    S: Send + Sync + 'static,
    F: Fn() -> anyhow::Result<S> + Send + Sync + 'static,
{
    let erased: ErasedFactory =
        Arc::new(move || factory().map(|service| Box::new(service) as Box<dyn Any + Send + Sync>));

    BINDINGS
        .write()
        .entry(TypeId::of::<S>())
        .or_default()
        .push(Binding {
            name,
            priority,
            factory: erased,
        });

    tracing::debug!(
        "Registered binding '{}' (priority {}) for {}",
        name,
        priority,
        type_name::<S>()
    );
}

/// Returns whether any binding exists for `S`.
pub fn has_binding<S: Send + Sync + 'static>() -> bool {
    BINDINGS
        .read()
        .get(&TypeId::of::<S>())
        .is_some_and(|bindings| !bindings.is_empty())
}

/// Instantiates the highest-priority binding for `S`.
///
/// Fails if no binding is registered or if the winning factory fails.
/// A tie between the top priorities is logged and resolved in favor of
/// the earliest registration.
pub fn load<S: Send + Sync + 'static>() -> anyhow::Result<S> {
    let (name, factory) = {
        let bindings = BINDINGS.read();
        let candidates = bindings
            .get(&TypeId::of::<S>())
            .filter(|candidates| !candidates.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No binding registered for {}", type_name::<S>()))?;

        let best = candidates
            .iter()
            .max_by_key(|binding| binding.priority)
            .map(|binding| binding.priority)
            .unwrap_or_default();
        let mut winners = candidates
            .iter()
            .filter(|binding| binding.priority == best);

        // Earliest registration wins a tie.
        let winner = winners.next().expect("at least one candidate");
        if let Some(runner_up) = winners.next() {
            tracing::warn!(
                "Multiple bindings for {} share priority {}: picking '{}' over '{}'",
                type_name::<S>(),
                best,
                winner.name,
                runner_up.name
            );
        }

        (winner.name, winner.factory.clone())
    };

    instantiate::<S>(name, &factory)
}

/// Instantiates all bindings for `S`, ordered by descending priority.
///
/// Factory failures are logged and skipped, so the result may contain
/// fewer entries than there are bindings.
pub fn load_all<S: Send + Sync + 'static>() -> Vec<S> {
    let candidates: Vec<(&'static str, ErasedFactory)> = {
        let bindings = BINDINGS.read();
        let Some(candidates) = bindings.get(&TypeId::of::<S>()) else {
            return Vec::new();
        };

        let mut ordered: Vec<&Binding> = candidates.iter().collect();
        ordered.sort_by_key(|binding| std::cmp::Reverse(binding.priority));
        ordered
            .into_iter()
            .map(|binding| (binding.name, binding.factory.clone()))
            .collect()
    };

    candidates
        .into_iter()
        .filter_map(|(name, factory)| match instantiate::<S>(name, &factory) {
            Ok(service) => Some(service),
            Err(err) => {
                tracing::warn!(
                    "Skipping binding '{}' for {}: {:#}",
                    name,
                    type_name::<S>(),
                    err
                );
                None
            }
        })
        .collect()
}

fn instantiate<S: Send + Sync + 'static>(
    name: &'static str,
    factory: &ErasedFactory,
) -> anyhow::Result<S> {
    let service = factory()
        .map_err(|err| err.context(format!("Binding '{}' failed to instantiate", name)))?;

    service
        .downcast::<S>()
        .map(|service| *service)
        .map_err(|_| {
            anyhow::anyhow!(
                "Binding '{}' produced a value that is not a {}",
                name,
                type_name::<S>()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own service type: the registry is process-global.

    #[test]
    fn load_picks_highest_priority() {
        #[derive(Debug, PartialEq)]
        struct Service(&'static str);

        register::<Arc<Service>, _>("low", -10, || Ok(Arc::new(Service("low"))));
        register::<Arc<Service>, _>("high", 50, || Ok(Arc::new(Service("high"))));
        register::<Arc<Service>, _>("mid", 0, || Ok(Arc::new(Service("mid"))));

        let service = load::<Arc<Service>>().unwrap();
        assert_eq!(service.0, "high");
    }

    #[test]
    fn load_resolves_ties_by_registration_order() {
        #[derive(Debug, PartialEq)]
        struct Service(&'static str);

        register::<Arc<Service>, _>("first", 10, || Ok(Arc::new(Service("first"))));
        register::<Arc<Service>, _>("second", 10, || Ok(Arc::new(Service("second"))));

        let service = load::<Arc<Service>>().unwrap();
        assert_eq!(service.0, "first");
    }

    #[test]
    fn load_fails_without_binding() {
        struct Unbound;

        assert!(!has_binding::<Arc<Unbound>>());
        let result = load::<Arc<Unbound>>();
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("No binding"));
    }

    #[test]
    fn load_surfaces_factory_failure() {
        struct Failing;

        register::<Arc<Failing>, _>("broken", 0, || anyhow::bail!("no database"));

        let result = load::<Arc<Failing>>();
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("broken"));
        assert!(message.contains("no database"));
    }

    #[test]
    fn load_all_orders_by_priority_and_skips_failures() {
        #[derive(Debug, PartialEq)]
        struct Service(&'static str);

        register::<Arc<Service>, _>("fallback", -100, || Ok(Arc::new(Service("fallback"))));
        register::<Arc<Service>, _>("broken", 100, || anyhow::bail!("boom"));
        register::<Arc<Service>, _>("primary", 10, || Ok(Arc::new(Service("primary"))));

        let services = load_all::<Arc<Service>>();
        let names: Vec<&str> = services.iter().map(|service| service.0).collect();
        assert_eq!(names, vec!["primary", "fallback"]);
    }
}
