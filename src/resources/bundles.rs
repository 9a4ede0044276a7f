//! Cached loading of resource and settings bundles.

use super::{Bundle, ResourceLocator};
use crate::DEFAULT_LANGUAGE;
use crate::cache::ProcessCache;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::{Notify, RwLock};

#[cfg(test)]
use mock_instant::global::Instant;
#[cfg(not(test))]
use std::time::Instant;

/// Name of the bundle consulted when a key is missing everywhere else.
pub const GENERAL_BUNDLE: &str = "general";

/// How long a cached bundle is served without asking the locators for the
/// current modification time.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Loads bundles through the configured locators and caches the parsed
/// result per file.
///
/// A cached bundle is revalidated at most once per check interval: the
/// locators are asked for the current modification time, and only a
/// changed one triggers a reload. Missing files are cached as empty
/// bundles under the same policy, so a file appearing later is picked up.
pub struct ResourceBundles {
    locators: Vec<Arc<dyn ResourceLocator>>,
    check_interval: Duration,
    entries: ProcessCache<String, Arc<BundleEntry>>,
}

struct BundleEntry {
    file_name: String,
    state: RwLock<Option<BundleState>>,
    fetching: AtomicBool,
    notify: Notify,
}

struct BundleState {
    bundle: Arc<Bundle>,
    modified: Option<SystemTime>,
    last_checked: Instant,
}

impl ResourceBundles {
    /// Creates a loader over the given locators, consulted in order.
    pub fn new(locators: Vec<Arc<dyn ResourceLocator>>) -> Self {
        Self {
            locators,
            check_interval: DEFAULT_CHECK_INTERVAL,
            entries: ProcessCache::new(),
        }
    }

    /// Creates a loader over the locators contributed via [`crate::spi`].
    pub fn from_spi() -> Self {
        Self::new(super::locators())
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Resolves `key` for the given language.
    ///
    /// Consults, in order: the localized bundle, the unlocalized bundle,
    /// then the same chain of the [`GENERAL_BUNDLE`].
    pub async fn lookup(&self, bundle_name: &str, key: &str, lang: &str) -> Option<String> {
        for file_name in candidate_files(bundle_name, lang)
            .into_iter()
            .chain(candidate_files(GENERAL_BUNDLE, lang))
        {
            if let Some(value) = self.file(&file_name).await.get(key) {
                return Some(value.to_owned());
            }
        }

        tracing::debug!("No value for '{}' in bundle '{}' ({})", key, bundle_name, lang);
        None
    }

    /// [`lookup`](Self::lookup) with the configured default language.
    pub async fn lookup_default(&self, bundle_name: &str, key: &str) -> Option<String> {
        self.lookup(bundle_name, key, DEFAULT_LANGUAGE.as_str()).await
    }

    /// Returns the best-matching localized bundle: the first non-empty
    /// candidate of `{name}_{lang}.properties`, `{name}.properties`.
    pub async fn bundle(&self, bundle_name: &str, lang: &str) -> Arc<Bundle> {
        let mut last = Arc::new(Bundle::empty());
        for file_name in candidate_files(bundle_name, lang) {
            last = self.file(&file_name).await;
            if !last.is_empty() {
                break;
            }
        }

        last
    }

    /// Returns the settings bundle `{name}.properties`.
    ///
    /// Settings are not localizable and have no fallback chain.
    pub async fn settings(&self, bundle_name: &str) -> Arc<Bundle> {
        self.file(&format!("{}.properties", bundle_name)).await
    }

    /// Drops all cached bundles. The next lookup reloads from the locators.
    pub fn flush(&self) {
        self.entries.clear();
    }

    /// The cached-or-reloaded bundle for an exact file name.
    pub async fn file(&self, file_name: &str) -> Arc<Bundle> {
        let entry = self.entry(file_name);

        if let Some(bundle) = self.fresh_from_cache(&entry).await {
            return bundle;
        }

        // Interest must be registered before the flag test: a revalidator
        // finishing in between would otherwise notify nobody and park this
        // task until the next revalidation.
        let reloaded = entry.notify.notified();
        if entry.fetching.swap(true, Ordering::SeqCst) {
            reloaded.await;

            let state = entry.state.read().await;
            return match state.as_ref() {
                Some(state) => state.bundle.clone(),
                None => Arc::new(Bundle::empty()),
            };
        }

        self.revalidate(&entry).await
    }

    fn entry(&self, file_name: &str) -> Arc<BundleEntry> {
        self.entries.get_or_insert_with(file_name.to_owned(), || {
            Arc::new(BundleEntry {
                file_name: file_name.to_owned(),
                state: RwLock::new(None),
                fetching: AtomicBool::new(false),
                notify: Notify::new(),
            })
        })
    }

    async fn fresh_from_cache(&self, entry: &BundleEntry) -> Option<Arc<Bundle>> {
        let state = entry.state.read().await;

        state
            .as_ref()
            .filter(|state| state.last_checked.elapsed() < self.check_interval)
            .map(|state| state.bundle.clone())
    }

    async fn revalidate(&self, entry: &BundleEntry) -> Arc<Bundle> {
        let previous = entry
            .state
            .read()
            .await
            .as_ref()
            .map(|state| (state.bundle.clone(), state.modified));

        let (bundle, modified) = match previous {
            Some((bundle, cached_modified)) => {
                let current_modified = self.locate_modified(&entry.file_name).await;
                if current_modified == cached_modified {
                    (bundle, cached_modified)
                } else {
                    tracing::debug!("Bundle '{}' changed, reloading", entry.file_name);
                    self.load(&entry.file_name).await
                }
            }
            None => self.load(&entry.file_name).await,
        };

        {
            let mut state = entry.state.write().await;
            *state = Some(BundleState {
                bundle: bundle.clone(),
                modified,
                last_checked: Instant::now(),
            });
        }

        entry.fetching.store(false, Ordering::SeqCst);
        entry.notify.notify_waiters();

        bundle
    }

    async fn locate_modified(&self, file_name: &str) -> Option<SystemTime> {
        for locator in &self.locators {
            match locator.modified(file_name).await {
                Ok(Some(modified)) => return Some(modified),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("Failed to check bundle '{}': {:#}", file_name, err);
                }
            }
        }

        None
    }

    async fn load(&self, file_name: &str) -> (Arc<Bundle>, Option<SystemTime>) {
        for locator in &self.locators {
            match locator.find(file_name).await {
                Ok(Some(resource)) => {
                    tracing::debug!(
                        "Loaded bundle '{}' ({} bytes)",
                        file_name,
                        resource.content.len()
                    );
                    return (Arc::new(Bundle::parse(&resource.content)), resource.modified);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("Failed to load bundle '{}': {:#}", file_name, err);
                }
            }
        }

        (Arc::new(Bundle::empty()), None)
    }
}

fn candidate_files(bundle_name: &str, lang: &str) -> [String; 2] {
    [
        format!("{}_{}.properties", bundle_name, lang),
        format!("{}.properties", bundle_name),
    ]
}
