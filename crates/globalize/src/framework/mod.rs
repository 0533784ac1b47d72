//! Framework strategy: how a project flavor is validated, scaffolded,
//! scanned and rewritten.

pub mod detect;
pub mod nextjs;
pub mod scaffold;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::{PipelineContext, StepError};

pub use detect::{
    adapter_key, detect_frameworks, detect_remote, framework_support, DetectedFramework,
    FrameworkSupport, PackageManifest, RepoStructure, SupportLevel,
};
pub use nextjs::NextAppRouterAdapter;

#[derive(Error, Debug)]
pub enum FrameworkError {
    /// The repository is not a project this adapter handles.
    #[error("{0}")]
    Unsupported(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package.json: {0}")]
    InvalidPackageJson(String),
}

impl FrameworkError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        FrameworkError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
pub trait FrameworkAdapter: Send + Sync {
    /// Registry key, e.g. `nextjs-app-router`.
    fn key(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    async fn validate(&self, repo_dir: &Path) -> Result<(), FrameworkError>;

    async fn setup_i18n(&self, ctx: &mut PipelineContext) -> Result<(), StepError>;

    /// Repository-relative directories to scan.
    fn source_dirs(&self) -> Vec<String>;

    /// Globs relative to each source directory.
    fn file_patterns(&self) -> Vec<String>;

    /// Task bullets for the rewrite prompt.
    fn transform_rules(&self) -> Vec<String>;
}

/// Adapters in registration order.
pub struct FrameworkRegistry {
    adapters: Vec<Arc<dyn FrameworkAdapter>>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NextAppRouterAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn FrameworkAdapter>) {
        self.adapters.retain(|a| a.key() != adapter.key());
        self.adapters.push(adapter);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn FrameworkAdapter>> {
        self.adapters.iter().find(|a| a.key() == key).cloned()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.key()).collect()
    }
}

impl Default for FrameworkRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = FrameworkRegistry::standard();
        assert_eq!(registry.keys(), vec!["nextjs-app-router"]);
        let adapter = registry.get("nextjs-app-router").unwrap();
        assert_eq!(adapter.name(), "Next.js App Router");
        assert!(registry.get("react-vite").is_none());
    }

    #[test]
    fn test_register_replaces_same_key() {
        let mut registry = FrameworkRegistry::standard();
        registry.register(Arc::new(NextAppRouterAdapter));
        assert_eq!(registry.keys().len(), 1);
    }

    #[test]
    fn test_unsupported_displays_bare_message() {
        let err = FrameworkError::Unsupported("No Next.js dependency found in package.json.".into());
        assert_eq!(err.to_string(), "No Next.js dependency found in package.json.");
    }
}
