use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", ".next", "dist", "build", "out"];

/// Include/exclude globs matched against repository-relative paths.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SourceFilter {
    /// Compiles the patterns; invalid ones are logged and dropped.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Self {
        Self {
            include: compile(include),
            exclude: compile(exclude),
        }
    }

    /// `{root}/**/*.{ext}` for every root and extension.
    pub fn for_roots<S: AsRef<str>>(roots: &[S], extensions: &[S]) -> Self {
        let patterns: Vec<String> = extensions
            .iter()
            .map(|ext| format!("**/*.{}", ext.as_ref().trim_start_matches('.')))
            .collect();
        Self::under_roots(roots, &patterns)
    }

    /// `{root}/{pattern}` for every root and root-relative pattern.
    pub fn under_roots<R: AsRef<str>, P: AsRef<str>>(roots: &[R], patterns: &[P]) -> Self {
        let include: Vec<String> = roots
            .iter()
            .flat_map(|root| {
                patterns.iter().map(move |pattern| {
                    format!(
                        "{}/{}",
                        root.as_ref().trim_end_matches('/'),
                        pattern.as_ref().trim_start_matches("./")
                    )
                })
            })
            .collect();
        Self::new::<String>(&include, &[])
    }

    pub fn matches(&self, relative: &Path) -> bool {
        let path = relative.to_string_lossy().replace('\\', "/");
        self.include.iter().any(|p| p.matches(&path)) && !self.exclude.iter().any(|p| p.matches(&path))
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p.as_ref()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Invalid source pattern '{}': {}", p.as_ref(), e);
                None
            }
        })
        .collect()
}

/// Lists source files under `repo_dir` accepted by `filter`, sorted.
pub fn discover_source_files(repo_dir: &Path, filter: &SourceFilter) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(repo_dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| SKIPPED_DIRS.contains(&n)))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(repo_dir).ok()?.to_path_buf();
            filter.matches(&relative).then_some(relative)
        })
        .collect();
    files.sort();
    debug!("Discovered {} source files in {}", files.len(), repo_dir.display());
    files
}
