//! # Keel
//!
//! The technical foundation shared by our application suite.
//!
//! Keel bundles the cross-cutting plumbing every service in the suite needs
//! but none should implement itself: a service-locator facade over a
//! pluggable bean container, a logging facade with file-based level
//! configuration, and a loader for resource bundles stored outside the
//! deployed artifact.
//!
//! ## Modules
//!
//! - [`beans`] - Bean container abstraction and the managed bean provider
//!   with its per-thread singleton cache
//! - [`spi`] - Plugin discovery with priority-based selection
//! - [`resources`] - Localized resource bundles and settings bundles with
//!   periodic cache invalidation
//! - [`logging`] - Tracing setup, logger namespaces, and per-namespace
//!   level resolution
//! - [`cache`] - Minimal key-value stores with process and thread lifetimes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::beans::{self, StaticBeanContainer};
//!
//! fn main() -> anyhow::Result<()> {
//!     keel::logging::setup_tracing();
//!
//!     StaticBeanContainer::global().register_instance(MyService::new());
//!     let service = beans::provider()?.get::<MyService>()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_NAME` | Application identifier | `KEEL` |
//! | `APP_VERSION` | Version string | `DEVELOPMENT-SNAPSHOT-VERSION` |
//! | `RESOURCES_DIR` | Directory holding resource bundles | `resources` |
//! | `CONFIG_DIR` | Directory holding configuration files | `config` |
//! | `DEFAULT_LANGUAGE` | Language used for bundle lookups without an explicit one | `en` |
//! | `RUST_LOG` | Console log filter, overrides `logging.properties` | (unset) |

use std::env;
use std::sync::LazyLock;

/// Bean container abstraction and the managed bean provider.
pub mod beans;

/// Minimal key-value stores with process and thread lifetimes.
pub mod cache;

/// Tracing setup, logger namespaces, and level resolution.
pub mod logging;

/// Resource bundles and settings bundles.
pub mod resources;

/// Plugin discovery with priority-based selection.
pub mod spi;

/// Application name from `APP_NAME` environment variable.
///
/// Used in logging and service identification. Defaults to `"KEEL"`.
pub static APP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("APP_NAME").unwrap_or("KEEL".to_string()));

/// Application version from `APP_VERSION` environment variable.
///
/// Typically set during CI/CD builds. Defaults to
/// `"DEVELOPMENT-SNAPSHOT-VERSION"` for local development.
pub static APP_VERSION: LazyLock<String> =
    LazyLock::new(|| env::var("APP_VERSION").unwrap_or("DEVELOPMENT-SNAPSHOT-VERSION".to_string()));

/// Directory holding resource bundles, from `RESOURCES_DIR`.
///
/// Bundles live outside the deployed artifact so that operations can
/// update texts and settings without a redeploy. Defaults to `"resources"`.
pub static RESOURCES_DIR: LazyLock<String> =
    LazyLock::new(|| env::var("RESOURCES_DIR").unwrap_or("resources".to_string()));

/// Directory holding configuration files, from `CONFIG_DIR`.
///
/// Currently only `logging.properties` is read from here.
/// Defaults to `"config"`.
pub static CONFIG_DIR: LazyLock<String> =
    LazyLock::new(|| env::var("CONFIG_DIR").unwrap_or("config".to_string()));

/// Language used for bundle lookups without an explicit one, from
/// `DEFAULT_LANGUAGE`. Defaults to `"en"`.
pub static DEFAULT_LANGUAGE: LazyLock<String> =
    LazyLock::new(|| env::var("DEFAULT_LANGUAGE").unwrap_or("en".to_string()));
