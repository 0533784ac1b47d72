//! Framework detection from `package.json` and the repository's top-level
//! layout.
//!
//! Detectors run in a fixed order and each reports at most one framework;
//! a repository can match several (a Remix app also depends on React).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::github::{DirEntry, EntryKind, HostingApi, HostingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportLevel {
    Full,
    ComingSoon,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFramework {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Variant such as `app-router`, `pages-router`, `nuxt3` or `vite`.
    #[serde(rename = "type")]
    pub kind: String,
    pub supported: bool,
    pub support_level: SupportLevel,
}

impl DetectedFramework {
    fn new(name: &str, version: Option<&str>, kind: &str, support_level: SupportLevel) -> Self {
        Self {
            name: name.to_string(),
            version: version.map(str::to_string),
            kind: kind.to_string(),
            supported: support_level == SupportLevel::Full,
            support_level,
        }
    }
}

/// Whether the pipeline can proceed with a framework, and why not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkSupport {
    pub framework: DetectedFramework,
    pub can_proceed: bool,
    pub message: Option<String>,
}

/// Top-level directories that distinguish project flavors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStructure {
    pub has_app_dir: bool,
    pub has_pages_dir: bool,
    pub has_src_dir: bool,
}

impl RepoStructure {
    pub fn from_entries(entries: &[DirEntry]) -> Self {
        let has_dir = |name: &str| {
            entries
                .iter()
                .any(|e| e.kind == EntryKind::Dir && e.name == name)
        };
        Self {
            has_app_dir: has_dir("app"),
            has_pages_dir: has_dir("pages"),
            has_src_dir: has_dir("src"),
        }
    }
}

/// The parts of `package.json` detection looks at.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Runtime and dev dependencies; a runtime entry wins on conflict.
    pub fn all_dependencies(&self) -> Dependencies {
        let mut merged = BTreeMap::new();
        for (name, version) in self.dev_dependencies.iter().chain(&self.dependencies) {
            let version = match version {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            merged.insert(name.clone(), version);
        }
        Dependencies(merged)
    }

    /// Whether `name` is a runtime (not dev) dependency.
    pub fn has_runtime_dependency(&self, name: &str) -> bool {
        self.dependencies
            .get(name)
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dependencies(BTreeMap<String, String>);

impl Dependencies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

type Detector = fn(&Dependencies, &RepoStructure) -> Option<DetectedFramework>;

/// Detectors in reporting order.
pub const FRAMEWORK_DETECTORS: &[Detector] = &[
    detect_nextjs,
    detect_react,
    detect_vue,
    detect_angular,
    detect_svelte,
    detect_astro,
];

fn detect_nextjs(deps: &Dependencies, structure: &RepoStructure) -> Option<DetectedFramework> {
    let version = deps.get("next")?;
    let (kind, level) = if structure.has_app_dir {
        ("app-router", SupportLevel::Full)
    } else if structure.has_pages_dir {
        ("pages-router", SupportLevel::ComingSoon)
    } else {
        ("unknown", SupportLevel::ComingSoon)
    };
    Some(DetectedFramework::new("Next.js", Some(version), kind, level))
}

fn detect_react(deps: &Dependencies, structure: &RepoStructure) -> Option<DetectedFramework> {
    let react = deps.get("react")?;
    // An App Router project is already reported as Next.js.
    if deps.has("next") && structure.has_app_dir {
        return None;
    }

    let detected = if let Some(remix) = deps.get("@remix-run/react") {
        DetectedFramework::new("Remix", Some(remix), "remix", SupportLevel::ComingSoon)
    } else if deps.has("vite") || deps.has("@vitejs/plugin-react") {
        DetectedFramework::new("React + Vite", Some(react), "vite", SupportLevel::ComingSoon)
    } else if deps.has("react-scripts") {
        DetectedFramework::new("React (CRA)", Some(react), "cra", SupportLevel::ComingSoon)
    } else {
        DetectedFramework::new("React", Some(react), "unknown", SupportLevel::NotSupported)
    };
    Some(detected)
}

fn detect_vue(deps: &Dependencies, _structure: &RepoStructure) -> Option<DetectedFramework> {
    if let Some(nuxt) = deps.get("nuxt") {
        return Some(DetectedFramework::new(
            "Nuxt",
            Some(nuxt),
            "nuxt3",
            SupportLevel::ComingSoon,
        ));
    }
    let vue = deps.get("vue")?;
    Some(DetectedFramework::new("Vue", Some(vue), "vue", SupportLevel::ComingSoon))
}

fn detect_angular(deps: &Dependencies, _structure: &RepoStructure) -> Option<DetectedFramework> {
    let version = deps.get("@angular/core")?;
    Some(DetectedFramework::new(
        "Angular",
        Some(version),
        "angular",
        SupportLevel::ComingSoon,
    ))
}

fn detect_svelte(deps: &Dependencies, _structure: &RepoStructure) -> Option<DetectedFramework> {
    if let Some(kit) = deps.get("@sveltejs/kit") {
        return Some(DetectedFramework::new(
            "SvelteKit",
            Some(kit),
            "sveltekit",
            SupportLevel::ComingSoon,
        ));
    }
    let svelte = deps.get("svelte")?;
    Some(DetectedFramework::new(
        "Svelte",
        Some(svelte),
        "svelte",
        SupportLevel::ComingSoon,
    ))
}

fn detect_astro(deps: &Dependencies, _structure: &RepoStructure) -> Option<DetectedFramework> {
    let version = deps.get("astro")?;
    Some(DetectedFramework::new(
        "Astro",
        Some(version),
        "astro",
        SupportLevel::ComingSoon,
    ))
}

/// Runs every detector against a manifest and layout.
pub fn detect_frameworks(
    manifest: &PackageManifest,
    structure: &RepoStructure,
) -> Vec<DetectedFramework> {
    let deps = manifest.all_dependencies();
    FRAMEWORK_DETECTORS
        .iter()
        .filter_map(|detect| detect(&deps, structure))
        .collect()
}

/// Fetches `package.json` and the root listing through the hosting API and
/// runs the detectors.
pub async fn detect_remote(
    hosting: &dyn HostingApi,
    owner: &str,
    repo: &str,
) -> Result<Vec<DetectedFramework>, HostingError> {
    let raw = hosting.get_file_content(owner, repo, "package.json").await?;
    let manifest = PackageManifest::from_json(&raw)
        .map_err(|e| HostingError::Decode(format!("package.json: {}", e)))?;
    let entries = hosting.list_directory(owner, repo, "").await?;
    let structure = RepoStructure::from_entries(&entries);

    let frameworks = detect_frameworks(&manifest, &structure);
    debug!(
        owner,
        repo,
        detected = ?frameworks.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        "Framework detection finished"
    );
    Ok(frameworks)
}

pub fn framework_support(framework: &DetectedFramework) -> FrameworkSupport {
    let message = match framework.support_level {
        SupportLevel::Full => None,
        SupportLevel::ComingSoon => Some(format!(
            "{} support is coming soon! Currently only Next.js App Router is supported.",
            framework.name
        )),
        SupportLevel::NotSupported => Some(format!(
            "{} is not currently supported. Only Next.js App Router projects are supported.",
            framework.name
        )),
    };
    FrameworkSupport {
        framework: framework.clone(),
        can_proceed: framework.support_level == SupportLevel::Full,
        message,
    }
}

/// Registry key of the adapter handling a detected framework.
pub fn adapter_key(framework: &DetectedFramework) -> String {
    if framework.kind == "app-router" {
        return "nextjs-app-router".to_string();
    }
    let name = framework
        .name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{}-{}", name, framework.kind)
}
