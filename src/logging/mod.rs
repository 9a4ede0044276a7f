//! Logging facade and tracing setup.
//!
//! Log output goes through `tracing`. [`setup_tracing`] installs the
//! subscriber once at startup; [`Logger`] provides a namespace-bound
//! handle for code that wants per-namespace level control.
//!
//! # Namespaces
//!
//! A logger namespace is the `::`-separated type path with generics
//! stripped, derived via [`namespace_of`]. Types can override this by
//! implementing [`LogNamespace`].
//!
//! # Level configuration
//!
//! Levels are read from `logging.properties` in the config directory.
//! Each line maps a namespace to a level, `root` sets the default:
//!
//! ```text
//! root=info
//! keel::resources=debug
//! noisy::crate=off
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RUST_LOG` | Console log filter, overrides `logging.properties` | (unset) |
//! | `CONFIG_DIR` | Directory containing `logging.properties` | `config` |
//!
//! # Output Modes
//!
//! Without `pretty_logs`, output is plain text suitable for log
//! aggregation:
//! ```text
//! INFO keel::resources: Loaded bundle 'app.properties' (120 bytes)
//! ```
//!
//! With `pretty_logs`, output is colorized with timestamps and span
//! nesting for local development.

use crate::CONFIG_DIR;
use crate::resources::Bundle;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[cfg(not(feature = "pretty_logs"))]
mod production;

#[cfg(feature = "pretty_logs")]
mod pretty;

/// File name of the level configuration within the config directory.
const LEVELS_FILE: &str = "logging.properties";

/// Namespace entry selecting the default level.
const ROOT_NAMESPACE: &str = "root";

static LEVELS: LazyLock<LevelConfig> = LazyLock::new(LevelConfig::load);

/// Derives the logger namespace for a type: its path with any generic
/// arguments stripped.
///
/// ```
/// assert_eq!(keel::logging::namespace_of::<Vec<String>>(), "alloc::vec::Vec");
/// ```
pub fn namespace_of<T: ?Sized>() -> String {
    let name = std::any::type_name::<T>();
    match name.split_once('<') {
        Some((path, _)) => path.to_owned(),
        None => name.to_owned(),
    }
}

/// Overrides the derived logger namespace of a type.
pub trait LogNamespace {
    fn namespace() -> String {
        namespace_of::<Self>()
    }
}

/// Per-namespace log levels parsed from `logging.properties`.
pub struct LevelConfig {
    root: LevelFilter,
    entries: HashMap<String, LevelFilter>,
}

impl LevelConfig {
    /// Reads the configuration from the config directory.
    ///
    /// A missing file yields the default configuration (root `info`).
    pub fn load() -> Self {
        let path = Path::new(CONFIG_DIR.as_str()).join(LEVELS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("Cannot read {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Parses `namespace=level` lines. Unknown levels are skipped with
    /// a warning.
    pub fn parse(contents: &str) -> Self {
        let bundle = Bundle::parse(contents);
        let mut config = Self::default();

        for namespace in bundle.keys() {
            let value = bundle.get(namespace).unwrap_or_default();
            let Ok(level) = LevelFilter::from_str(value) else {
                tracing::warn!(
                    "Ignoring invalid level '{}' for namespace '{}'",
                    value,
                    namespace
                );
                continue;
            };

            if namespace == ROOT_NAMESPACE {
                config.root = level;
            } else {
                config.entries.insert(namespace.to_owned(), level);
            }
        }

        config
    }

    /// Resolves the effective level for a namespace from its nearest
    /// configured ancestor (`a::b::c`, then `a::b`, then `a`, then root).
    pub fn level_for(&self, namespace: &str) -> LevelFilter {
        let mut current = namespace;
        loop {
            if let Some(level) = self.entries.get(current) {
                return *level;
            }
            match current.rsplit_once("::") {
                Some((parent, _)) => current = parent,
                None => return self.root,
            }
        }
    }

    /// The configuration as `EnvFilter` directives for the subscriber.
    fn to_env_filter(&self) -> EnvFilter {
        let mut directives = self.root.to_string().to_lowercase();
        for (namespace, level) in &self.entries {
            directives.push_str(&format!(",{}={}", namespace, level.to_string().to_lowercase()));
        }

        // Records emitted through `Logger` carry this module as their
        // target, gated per namespace by `Logger::enabled`. The subscriber
        // therefore has to admit the most verbose configured level for
        // that target, or namespace entries below root would never reach
        // the console.
        let facade = self
            .entries
            .values()
            .copied()
            .max()
            .unwrap_or(self.root)
            .max(self.root);
        directives.push_str(&format!(
            ",{}={}",
            module_path!(),
            facade.to_string().to_lowercase()
        ));

        EnvFilter::new(directives)
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            root: LevelFilter::INFO,
            entries: HashMap::new(),
        }
    }
}

/// A logging handle bound to a namespace.
///
/// The effective level is resolved once from the global [`LevelConfig`]
/// at construction. Records are emitted through `tracing` with the
/// namespace attached.
pub struct Logger {
    namespace: String,
    level: LevelFilter,
}

impl Logger {
    /// A logger for an explicit namespace.
    pub fn named(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let level = LEVELS.level_for(&namespace);
        Self { namespace, level }
    }

    /// A logger for the derived namespace of `T`.
    pub fn for_type<T: ?Sized>() -> Self {
        Self::named(namespace_of::<T>())
    }

    /// A logger for a type with an overridden namespace.
    pub fn of<T: LogNamespace>() -> Self {
        Self::named(T::namespace())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn log(&self, level: Level, message: &str) {
        if !self.enabled(level) {
            return;
        }

        // Macro targets must be constant, so the namespace travels as a field.
        match level {
            Level::ERROR => tracing::error!(namespace = %self.namespace, "{}", message),
            Level::WARN => tracing::warn!(namespace = %self.namespace, "{}", message),
            Level::INFO => tracing::info!(namespace = %self.namespace, "{}", message),
            Level::DEBUG => tracing::debug!(namespace = %self.namespace, "{}", message),
            Level::TRACE => tracing::trace!(namespace = %self.namespace, "{}", message),
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::TRACE, message);
    }

    #[cfg(test)]
    fn with_level(namespace: impl Into<String>, level: LevelFilter) -> Self {
        Self {
            namespace: namespace.into(),
            level,
        }
    }
}

/// Initializes the tracing subscriber with console output.
///
/// Should be called once at application startup. Filtering uses
/// `RUST_LOG` when set, otherwise the directives from
/// `logging.properties`, otherwise `info`.
///
/// # Panics
///
/// Panics if called more than once (the subscriber can only be set once).
pub fn setup_tracing() {
    Registry::default().with(console_layer()).init();
    tracing::info!(
        "Tracing initialized for {} {} [reporting to console only]",
        crate::APP_NAME.as_str(),
        crate::APP_VERSION.as_str()
    );
}

fn console_filter() -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => LEVELS.to_env_filter(),
    }
}

#[cfg(not(feature = "pretty_logs"))]
fn console_layer() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(production::ProductionLogFormat)
        .with_filter(console_filter())
        .boxed()
}

#[cfg(feature = "pretty_logs")]
fn console_layer() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    tracing_subscriber::fmt::layer()
        .event_format(pretty::PrettyConsoleLogFormat)
        .with_filter(console_filter())
        .boxed()
}
