//! Resource bundles and settings bundles stored outside the artifact.
//!
//! Texts and settings live in an external directory (`RESOURCES_DIR`) so
//! that operations can change them without a redeploy. [`ResourceBundles`]
//! loads them on demand, caches the parsed bundles and revalidates at most
//! once per check interval. Where the files come from is pluggable: a
//! [`ResourceLocator`] resolves file names to content, and additional
//! locators can be contributed through [`crate::spi`].

use crate::RESOURCES_DIR;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::SystemTime;

mod bundle;
mod bundles;

pub use bundle::Bundle;
pub use bundles::{GENERAL_BUNDLE, ResourceBundles};

/// A located resource: its content and, when known, its modification time.
#[derive(Debug, Clone)]
pub struct Resource {
    pub content: String,
    pub modified: Option<SystemTime>,
}

/// Resolves resource file names to their content.
///
/// Implementations are consulted in priority order; the first one that
/// knows the file wins. `modified` exists so that the bundle cache can
/// revalidate without re-reading content.
#[async_trait]
pub trait ResourceLocator: Send + Sync {
    /// Fetches the resource, or `None` when this locator does not have it.
    async fn find(&self, file_name: &str) -> anyhow::Result<Option<Resource>>;

    /// Reports the current modification time, or `None` when this locator
    /// does not have the file.
    async fn modified(&self, file_name: &str) -> anyhow::Result<Option<SystemTime>>;
}

/// Locates resources as plain files below a root directory.
pub struct FileSystemLocator {
    root: PathBuf,
}

impl FileSystemLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The locator rooted at the configured resources directory.
    pub fn from_env() -> Self {
        Self::new(RESOURCES_DIR.as_str())
    }
}

#[async_trait]
impl ResourceLocator for FileSystemLocator {
    async fn find(&self, file_name: &str) -> anyhow::Result<Option<Resource>> {
        let path = self.root.join(file_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read resource '{}'", path.display()))?;
        let modified = tokio::fs::metadata(&path)
            .await
            .ok()
            .and_then(|metadata| metadata.modified().ok());

        Ok(Some(Resource { content, modified }))
    }

    async fn modified(&self, file_name: &str) -> anyhow::Result<Option<SystemTime>> {
        let path = self.root.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.modified().ok()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to stat resource '{}'", path.display()))
            }
        }
    }
}

static DEFAULT_BINDINGS: Once = Once::new();

fn ensure_default_bindings() {
    DEFAULT_BINDINGS.call_once(|| {
        crate::spi::register::<Arc<dyn ResourceLocator>, _>("filesystem-locator", -100, || {
            let locator: Arc<dyn ResourceLocator> = Arc::new(FileSystemLocator::from_env());
            Ok(locator)
        });
    });
}

/// All contributed resource locators, priority-descending, with the
/// built-in filesystem locator bound at priority -100.
pub fn locators() -> Vec<Arc<dyn ResourceLocator>> {
    ensure_default_bindings();
    crate::spi::load_all::<Arc<dyn ResourceLocator>>()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_locator_reads_existing_files() {
        let dir = test::test_dir("locator");
        std::fs::write(dir.join("app.properties"), "greeting=Hello\n").unwrap();

        let locator = FileSystemLocator::new(&dir);
        let resource = locator.find("app.properties").await.unwrap().unwrap();
        assert!(resource.content.contains("greeting=Hello"));
        assert!(resource.modified.is_some());

        let modified = locator.modified("app.properties").await.unwrap();
        assert_eq!(modified, resource.modified);
    }

    #[tokio::test]
    async fn filesystem_locator_reports_missing_files_as_none() {
        let dir = test::test_dir("locator-missing");
        let locator = FileSystemLocator::new(&dir);

        assert!(locator.find("nope.properties").await.unwrap().is_none());
        assert!(locator.modified("nope.properties").await.unwrap().is_none());
    }
}
