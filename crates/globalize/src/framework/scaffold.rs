//! next-intl and Lingo.dev scaffolding written into the cloned repository.
//!
//! Outputs are byte-stable: the same locales always produce the same files.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tokio::fs;

use super::detect::PackageManifest;
use super::FrameworkError;

pub const LINGO_SCHEMA_URL: &str = "https://lingo.dev/schema/i18n.json";
pub const LINGO_MANIFEST_VERSION: &str = "1.10";

/// Matcher used by the App Router adapter.
pub const ADAPTER_MIDDLEWARE_MATCHER: &str = r"'/((?!api|_next|_vercel|.*\..*).*)'";
/// Matcher used by the framework-agnostic scaffold.
pub const DEFAULT_MIDDLEWARE_MATCHER: &str = r"'/((?!_next|.*\\..*).*)'";

pub const NEXT_CONFIG_TS: &str = "import type { NextConfig } from 'next';
import createNextIntlPlugin from 'next-intl/plugin';

const withNextIntl = createNextIntlPlugin();

const config: NextConfig = {
  reactStrictMode: true
};

export default withNextIntl(config);
";

/// Root files moved under `app/[locale]/`.
pub const LOCALIZED_ROOT_FILES: &[&str] = &["layout.tsx", "page.tsx"];

const UNSUPPORTED_PROJECT: &str = "Currently supports Next.js App Router projects only.";
const MISSING_NEXT_DEPENDENCY: &str = "No Next.js dependency found in package.json.";

static RE_BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<body([^>]*)>").unwrap());

#[derive(Serialize)]
struct LingoManifest<'a> {
    #[serde(rename = "$schema")]
    schema: &'a str,
    version: &'a str,
    locale: ManifestLocales<'a>,
    buckets: ManifestBuckets<'a>,
}

#[derive(Serialize)]
struct ManifestLocales<'a> {
    source: &'a str,
    targets: &'a [String],
}

#[derive(Serialize)]
struct ManifestBuckets<'a> {
    json: ManifestBucket<'a>,
}

#[derive(Serialize)]
struct ManifestBucket<'a> {
    include: [&'a str; 1],
}

/// `i18n.json` for the Lingo.dev CLI.
pub fn render_lingo_manifest(source: &str, targets: &[String]) -> String {
    let manifest = LingoManifest {
        schema: LINGO_SCHEMA_URL,
        version: LINGO_MANIFEST_VERSION,
        locale: ManifestLocales { source, targets },
        buckets: ManifestBuckets {
            json: ManifestBucket {
                include: ["messages/[locale].json"],
            },
        },
    };
    // Plain strings and slices always serialize.
    let mut json = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    json.push('\n');
    json
}

/// `lib/i18n.ts`: locale list and next-intl request config.
pub fn render_request_config(source: &str, targets: &[String]) -> String {
    let locales = std::iter::once(source)
        .chain(targets.iter().map(String::as_str))
        .map(|locale| format!("'{}'", locale))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "import {{ getRequestConfig }} from 'next-intl/server';

export const locales = [{locales}] as const;
export type Locale = (typeof locales)[number];

export default getRequestConfig(async ({{locale}}) => ({{
  messages: (await import(`../messages/${{locale}}.json`)).default
}}));
"
    )
}

/// `middleware.ts` routing requests through next-intl.
pub fn render_middleware(source: &str, matcher: &str) -> String {
    format!(
        "import createMiddleware from 'next-intl/middleware';
import {{ locales }} from './lib/i18n';

export default createMiddleware({{
  locales,
  defaultLocale: '{source}'
}});

export const config = {{
  matcher: [{matcher}]
}};
"
    )
}

/// Wraps the `<body>` children of a root layout in `NextIntlClientProvider`.
///
/// Imports are added unless the file already mentions next-intl. The wrap is
/// skipped when the provider is already present or the layout has no
/// `<body>` element.
pub fn wrap_layout_with_provider(layout: &str) -> String {
    let mut content = if layout.contains("next-intl") {
        layout.to_string()
    } else {
        format!(
            "import {{ NextIntlClientProvider }} from 'next-intl';\nimport {{ getMessages }} from 'next-intl/server';\n{}",
            layout
        )
    };

    let wrapped =
        content.contains("NextIntlClientProvider>") || content.contains("<NextIntlClientProvider");
    if !wrapped && RE_BODY_OPEN.is_match(&content) && content.contains("</body>") {
        content = RE_BODY_OPEN
            .replacen(
                &content,
                1,
                "<body$1>\n        <NextIntlClientProvider messages={await getMessages()}>",
            )
            .into_owned();
        content = content.replacen("</body>", "</NextIntlClientProvider>\n      </body>", 1);
    }
    content
}

/// Prompt bullets for rewriting components to next-intl.
pub fn default_transform_rules() -> Vec<String> {
    [
        "- Add the appropriate import from 'next-intl':",
        "  - For client components: \"import { useTranslations } from 'next-intl';\"",
        "  - For server components: \"import { getTranslations } from 'next-intl/server';\"",
        "- Introduce a translation helper:",
        "  - Client: \"const t = useTranslations('<namespace>');\"",
        "  - Server: \"const t = await getTranslations('<namespace>');\"",
        "  - Use a simple namespace like \"common\" unless another is clearly better from context.",
        "- Replace the listed hardcoded strings with calls to t('<key>').",
        "  - Keys should be lowercase, dot-separated, and derived from the English string, e.g. \"hero.title\", \"button.submit\".",
        "- Do NOT modify any code outside these string replacements and necessary imports/translation helper.",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}

async fn write_file(path: &Path, contents: &str) -> Result<(), FrameworkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| FrameworkError::io(parent, e))?;
    }
    fs::write(path, contents)
        .await
        .map_err(|e| FrameworkError::io(path, e))
}

/// Writes the manifest, an empty source catalog when none exists,
/// `lib/i18n.ts` and `middleware.ts`.
pub async fn write_shared_scaffold(
    repo_dir: &Path,
    source: &str,
    targets: &[String],
    matcher: &str,
) -> Result<(), FrameworkError> {
    write_file(
        &repo_dir.join("i18n.json"),
        &render_lingo_manifest(source, targets),
    )
    .await?;

    let catalog = repo_dir.join("messages").join(format!("{}.json", source));
    if !fs::try_exists(&catalog)
        .await
        .map_err(|e| FrameworkError::io(&catalog, e))?
    {
        write_file(&catalog, "{}\n").await?;
    }

    write_file(
        &repo_dir.join("lib").join("i18n.ts"),
        &render_request_config(source, targets),
    )
    .await?;
    write_file(
        &repo_dir.join("middleware.ts"),
        &render_middleware(source, matcher),
    )
    .await
}

pub async fn write_next_config(repo_dir: &Path) -> Result<(), FrameworkError> {
    write_file(&repo_dir.join("next.config.ts"), NEXT_CONFIG_TS).await
}

/// Adds the provider to `app/layout.tsx` if the file exists.
pub async fn wrap_root_layout(repo_dir: &Path) -> Result<bool, FrameworkError> {
    let layout = repo_dir.join("app").join("layout.tsx");
    if !fs::try_exists(&layout)
        .await
        .map_err(|e| FrameworkError::io(&layout, e))?
    {
        return Ok(false);
    }
    let original = fs::read_to_string(&layout)
        .await
        .map_err(|e| FrameworkError::io(&layout, e))?;
    write_file(&layout, &wrap_layout_with_provider(&original)).await?;
    Ok(true)
}

/// Moves `app/layout.tsx` and `app/page.tsx` into `app/[locale]/`.
///
/// Returns the `(from, to)` pairs actually moved, repository-relative.
pub async fn relocate_into_locale_segment(
    repo_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>, FrameworkError> {
    let app_dir = repo_dir.join("app");
    let locale_dir = app_dir.join("[locale]");
    fs::create_dir_all(&locale_dir)
        .await
        .map_err(|e| FrameworkError::io(&locale_dir, e))?;

    let mut moved = Vec::new();
    for name in LOCALIZED_ROOT_FILES {
        let from = app_dir.join(name);
        if !fs::try_exists(&from)
            .await
            .map_err(|e| FrameworkError::io(&from, e))?
        {
            continue;
        }
        let to = locale_dir.join(name);
        fs::rename(&from, &to)
            .await
            .map_err(|e| FrameworkError::io(&from, e))?;
        moved.push((
            PathBuf::from("app").join(name),
            PathBuf::from("app").join("[locale]").join(name),
        ));
    }
    Ok(moved)
}

/// Structural check for a Next.js App Router project: an `app/` directory,
/// a `package.json`, and `next` among its runtime dependencies.
pub async fn validate_next_app_router(repo_dir: &Path) -> Result<(), FrameworkError> {
    let app_dir = repo_dir.join("app");
    let manifest_path = repo_dir.join("package.json");

    let has_app_dir = fs::metadata(&app_dir).await.is_ok_and(|m| m.is_dir());
    let has_manifest = fs::metadata(&manifest_path).await.is_ok_and(|m| m.is_file());
    if !has_app_dir || !has_manifest {
        return Err(FrameworkError::Unsupported(UNSUPPORTED_PROJECT.to_string()));
    }

    let raw = fs::read_to_string(&manifest_path)
        .await
        .map_err(|e| FrameworkError::io(&manifest_path, e))?;
    let manifest = PackageManifest::from_json(&raw)
        .map_err(|e| FrameworkError::InvalidPackageJson(e.to_string()))?;
    if !manifest.has_runtime_dependency("next") {
        return Err(FrameworkError::Unsupported(
            MISSING_NEXT_DEPENDENCY.to_string(),
        ));
    }
    Ok(())
}
