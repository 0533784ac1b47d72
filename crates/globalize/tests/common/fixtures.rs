//! Project files and collaborator setups shared by the integration tests.

#![allow(dead_code)]

use globalize::test_support::{FakeHosting, FakeRewriter};

/// A minimal Next.js App Router project.
pub fn next_app_files() -> Vec<(String, String)> {
    [
        ("package.json", NEXT_PACKAGE_JSON),
        (
            "app/layout.tsx",
            "export default function RootLayout({ children }) {\n  return (\n    <html lang=\"en\">\n      <body>{children}</body>\n    </html>\n  );\n}\n",
        ),
        ("app/page.tsx", NEXT_PAGE),
    ]
    .into_iter()
    .map(|(path, content)| (path.to_string(), content.to_string()))
    .collect()
}

const NEXT_PACKAGE_JSON: &str =
    r#"{"name": "web", "dependencies": {"next": "15.0.3", "react": "19.0.0"}}"#;

const NEXT_PAGE: &str = "export default function Page() {\n  return (\n    <main>\n      <h1>Hello World</h1>\n      <p>   </p>\n      <span>{t('common.greeting')}</span>\n    </main>\n  );\n}\n";

/// `acme/web` on `main`, detectable as a Next.js App Router project.
pub fn next_app_hosting() -> FakeHosting {
    FakeHosting::new()
        .with_repo("acme", "web", "main")
        .with_file("acme", "web", "package.json", NEXT_PACKAGE_JSON)
        .with_root_dirs("acme", "web", &["app"])
}

/// Replaces `Hello World` on the page with a translation call.
pub fn page_rewriter() -> FakeRewriter {
    let response = serde_json::json!({
        "fileContent": NEXT_PAGE.replace("Hello World", "{t('home.title')}"),
        "messages": {"home.title": "Hello World"},
    });
    FakeRewriter::new().respond_for("app/page.tsx", &response.to_string())
}
